//! Schema introspection trait.
//!
//! Anything that can describe a database's current tables implements
//! [`SchemaIntrospector`]: a live connection in a driver crate, or a
//! [`SchemaSnapshot`](crate::snapshot::SchemaSnapshot) read from disk.
//! This crate only defines the seam so the diff engine stays
//! driver-agnostic.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::Table;

/// Whether a listed relation is a table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// An ordinary table.
    BaseTable,
    /// A view. Views are listed but never diffed.
    View,
}

/// Name and kind of a relation, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Relation name, unqualified.
    pub name: String,
    /// Whether the relation is a table or a view.
    pub kind: TableKind,
}

impl TableInfo {
    /// Creates a base-table entry.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::BaseTable,
        }
    }

    /// Creates a view entry.
    #[must_use]
    pub fn view(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::View,
        }
    }
}

/// Reads the current schema of a database.
pub trait SchemaIntrospector {
    /// Error type for introspection failures.
    type Error: std::error::Error;

    /// Lists the tables and views in `schema`.
    fn tables(&self, schema: &str) -> Result<Vec<TableInfo>, Self::Error>;

    /// Fetches the full definition of one table.
    fn table_schema(&self, schema: &str, table: &str) -> Result<Table, Self::Error>;
}

/// Lists `schema` and fetches every base table in it. Views are skipped.
///
/// # Errors
///
/// Propagates the introspector's error from either call.
pub fn collect_tables<I>(introspector: &I, schema: &str) -> Result<Vec<Table>, I::Error>
where
    I: SchemaIntrospector + ?Sized,
{
    let mut tables = Vec::new();
    for info in introspector.tables(schema)? {
        if info.kind == TableKind::View {
            debug!(schema, view = %info.name, "skipping view");
            continue;
        }
        tables.push(introspector.table_schema(schema, &info.name)?);
    }
    debug!(schema, tables = tables.len(), "collected tables");
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::DiffError;
    use crate::schema::{Column, TableKey};

    /// Records which tables were fetched.
    struct Recording {
        fetched: RefCell<Vec<String>>,
    }

    impl SchemaIntrospector for Recording {
        type Error = DiffError;

        fn tables(&self, _schema: &str) -> Result<Vec<TableInfo>, DiffError> {
            Ok(vec![
                TableInfo::table("users"),
                TableInfo::view("active_users"),
                TableInfo::table("orders"),
            ])
        }

        fn table_schema(&self, schema: &str, table: &str) -> Result<Table, DiffError> {
            self.fetched.borrow_mut().push(table.to_string());
            if table == "orders" {
                return Err(DiffError::TableNotFound(TableKey::new(schema, table)));
            }
            Ok(Table::new(schema, table).column(Column::new("id", "bigint")))
        }
    }

    #[test]
    fn test_collect_skips_views_and_propagates_errors() {
        let introspector = Recording {
            fetched: RefCell::new(Vec::new()),
        };
        let err = collect_tables(&introspector, "public").unwrap_err();
        assert!(matches!(err, DiffError::TableNotFound(ref key) if key.name == "orders"));
        assert_eq!(*introspector.fetched.borrow(), vec!["users", "orders"]);
    }

    #[test]
    fn test_table_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TableInfo::table("users")).unwrap();
        assert_eq!(json, r#"{"name":"users","kind":"base_table"}"#);
    }
}
