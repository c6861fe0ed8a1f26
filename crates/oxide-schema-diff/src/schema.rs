//! Schema representation types.
//!
//! These are the canonical, engine-agnostic descriptions of tables that
//! introspection hands to the diff engine. Type strings and default
//! expressions are kept exactly as the engine reported them.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, Result};

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table.
    pub name: String,
    /// Dialect-reported type, e.g. `varchar(255)`.
    pub data_type: String,
    /// Whether the column allows NULL values.
    #[serde(default = "nullable_by_default")]
    pub nullable: bool,
    /// Default value or expression, as reported by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Whether this column is part of the primary key.
    #[serde(default)]
    pub is_primary_key: bool,
}

const fn nullable_by_default() -> bool {
    true
}

impl Column {
    /// Creates a nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Marks the column as (part of) the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false; // Primary keys are always NOT NULL
        self
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name, unique within its table.
    pub name: String,
    /// Indexed columns; order matters for composite indexes.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub is_unique: bool,
}

impl Index {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            is_unique: false,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name, unique within its table.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Schema of the referenced table. Empty means the owner's schema.
    #[serde(default)]
    pub referenced_schema: String,
    /// Referenced table name.
    pub referenced_table: String,
    /// Referenced column(s), positionally matching `columns`.
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a foreign key referencing a table in the owner's schema.
    #[must_use]
    pub fn new<S: Into<String>, R: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
        referenced_table: impl Into<String>,
        referenced_columns: impl IntoIterator<Item = R>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_schema: String::new(),
            referenced_table: referenced_table.into(),
            referenced_columns: referenced_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the schema of the referenced table.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.referenced_schema = schema.into();
        self
    }

    /// Resolves the referenced table's identity, defaulting to the
    /// owning table's schema.
    #[must_use]
    pub fn referenced_key(&self, owner: &TableKey) -> TableKey {
        let schema = if self.referenced_schema.is_empty() {
            owner.schema.clone()
        } else {
            self.referenced_schema.clone()
        };
        TableKey::new(schema, self.referenced_table.clone())
    }
}

/// Composite identity of a table: schema name plus table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    /// Schema (namespace) name; may be empty.
    pub schema: String,
    /// Table name.
    pub name: String,
}

impl TableKey {
    /// Creates a table identity.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.schema, self.name)
        }
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Schema (namespace) name; may be empty for engines without schemas.
    #[serde(default)]
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Column definitions, in declaration order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Index definitions.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Foreign key definitions.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Returns the table's identity.
    #[must_use]
    pub fn key(&self) -> TableKey {
        TableKey::new(self.schema.clone(), self.name.clone())
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the primary key columns in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Checks that every object on the table is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::InvalidSchemaObject`] naming the first
    /// offending table, column, index or foreign key.
    pub fn validate(&self) -> Result<()> {
        let key = self.key();
        if self.name.trim().is_empty() {
            return Err(DiffError::invalid(&key, "<table>", "table name is empty"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(DiffError::invalid(&key, "<column>", "column name is empty"));
            }
            if column.data_type.trim().is_empty() {
                return Err(DiffError::invalid(&key, &column.name, "column data type is empty"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(DiffError::invalid(&key, &column.name, "duplicate column name"));
            }
        }

        seen.clear();
        for index in &self.indexes {
            if index.name.trim().is_empty() {
                return Err(DiffError::invalid(&key, "<index>", "index name is empty"));
            }
            if index.columns.is_empty() {
                return Err(DiffError::invalid(&key, &index.name, "index has no columns"));
            }
            if !seen.insert(index.name.as_str()) {
                return Err(DiffError::invalid(&key, &index.name, "duplicate index name"));
            }
        }

        seen.clear();
        for fk in &self.foreign_keys {
            if fk.name.trim().is_empty() {
                return Err(DiffError::invalid(&key, "<foreign key>", "foreign key name is empty"));
            }
            if fk.columns.is_empty() {
                return Err(DiffError::invalid(&key, &fk.name, "foreign key has no columns"));
            }
            if fk.referenced_table.trim().is_empty() {
                return Err(DiffError::invalid(&key, &fk.name, "referenced table is empty"));
            }
            if fk.columns.len() != fk.referenced_columns.len() {
                return Err(DiffError::invalid(
                    &key,
                    &fk.name,
                    format!(
                        "{} local column(s) but {} referenced column(s)",
                        fk.columns.len(),
                        fk.referenced_columns.len()
                    ),
                ));
            }
            if !seen.insert(fk.name.as_str()) {
                return Err(DiffError::invalid(&key, &fk.name, "duplicate foreign key name"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("public", "users")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("email", "varchar(255)").not_null())
            .index(Index::new("idx_users_email", ["email"]).unique())
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("id", "bigint").primary_key();
        assert_eq!(col.name, "id");
        assert!(col.is_primary_key);
        assert!(!col.nullable); // Primary keys are NOT NULL

        let col = Column::new("status", "text").default_value("'active'");
        assert!(col.nullable);
        assert_eq!(col.default_value.as_deref(), Some("'active'"));
    }

    #[test]
    fn test_table_key_display() {
        assert_eq!(TableKey::new("public", "users").to_string(), "public.users");
        assert_eq!(TableKey::new("", "users").to_string(), "users");
    }

    #[test]
    fn test_referenced_key_defaults_to_owner_schema() {
        let owner = TableKey::new("shop", "orders");
        let fk = ForeignKey::new("fk_user", ["user_id"], "users", ["id"]);
        assert_eq!(fk.referenced_key(&owner), TableKey::new("shop", "users"));

        let fk = fk.in_schema("auth");
        assert_eq!(fk.referenced_key(&owner), TableKey::new("auth", "users"));
    }

    #[test]
    fn test_primary_key_columns() {
        let table = users();
        let pk: Vec<&str> = table.primary_key().map(|c| c.name.as_str()).collect();
        assert_eq!(pk, vec!["id"]);
        assert!(table.get_column("email").is_some());
        assert!(table.get_column("missing").is_none());
    }

    #[test]
    fn test_validate_accepts_well_formed_table() {
        assert!(users().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_index() {
        let table = users().index(Index::new("idx_empty", Vec::<String>::new()));
        let err = table.validate().unwrap_err();
        assert!(matches!(
            err,
            DiffError::InvalidSchemaObject { ref object, ref table, .. }
                if object == "idx_empty" && table == "public.users"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_column() {
        let table = users().column(Column::new("email", "text"));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));
    }

    #[test]
    fn test_validate_rejects_mismatched_foreign_key() {
        let table = users().foreign_key(ForeignKey::new(
            "fk_org",
            ["org_id", "region"],
            "orgs",
            ["id"],
        ));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("2 local column(s) but 1 referenced column(s)"));
    }

    #[test]
    fn test_validate_rejects_empty_type() {
        let table = Table::new("", "logs").column(Column::new("id", " "));
        let err = table.validate().unwrap_err();
        assert!(matches!(err, DiffError::InvalidSchemaObject { ref object, .. } if object == "id"));
    }
}
