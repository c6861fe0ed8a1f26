//! JSON schema snapshots.
//!
//! A [`SchemaSnapshot`] is a saved copy of what introspection returned
//! for one database: its tables, the names of its views and optionally
//! the engine it came from. Snapshots let schemas be compared offline and
//! implement [`SchemaIntrospector`] so they can stand in for a live
//! connection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::Engine;
use crate::error::{DiffError, Result};
use crate::introspect::{SchemaIntrospector, TableInfo};
use crate::schema::{Table, TableKey};

/// Tables (and view names) of one database at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Engine the snapshot was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<Engine>,
    /// Table definitions.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Views. Listed by introspection, never diffed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<TableKey>,
}

impl SchemaSnapshot {
    /// Creates a snapshot of `tables`.
    #[must_use]
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            engine: None,
            tables,
            views: Vec::new(),
        }
    }

    /// Records the engine the snapshot came from.
    #[must_use]
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Serialization`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Serialization`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Io`] if the file cannot be read and
    /// [`DiffError::Serialization`] if it is not a valid snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json_str(&json)?;
        debug!(
            path = %path.display(),
            tables = snapshot.tables.len(),
            "loaded schema snapshot"
        );
        Ok(snapshot)
    }

    /// Writes the snapshot to a file, replacing it if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Returns the tables in `schema`.
    #[must_use]
    pub fn tables_in(&self, schema: &str) -> Vec<Table> {
        self.tables
            .iter()
            .filter(|t| t.schema == schema)
            .cloned()
            .collect()
    }

    /// Returns the distinct schema names used by the snapshot's tables.
    #[must_use]
    pub fn schemas(&self) -> Vec<&str> {
        let mut schemas: Vec<&str> = self.tables.iter().map(|t| t.schema.as_str()).collect();
        schemas.sort_unstable();
        schemas.dedup();
        schemas
    }
}

impl SchemaIntrospector for SchemaSnapshot {
    type Error = DiffError;

    fn tables(&self, schema: &str) -> Result<Vec<TableInfo>> {
        let tables = self
            .tables
            .iter()
            .filter(|t| t.schema == schema)
            .map(|t| TableInfo::table(t.name.clone()));
        let views = self
            .views
            .iter()
            .filter(|v| v.schema == schema)
            .map(|v| TableInfo::view(v.name.clone()));
        Ok(tables.chain(views).collect())
    }

    fn table_schema(&self, schema: &str, table: &str) -> Result<Table> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == table)
            .cloned()
            .ok_or_else(|| DiffError::TableNotFound(TableKey::new(schema, table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::collect_tables;
    use crate::schema::{Column, ForeignKey, Index};

    fn shop() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new(vec![
            Table::new("public", "users")
                .column(Column::new("id", "bigint").primary_key())
                .column(Column::new("email", "text").not_null())
                .index(Index::new("idx_users_email", ["email"]).unique()),
            Table::new("public", "orders")
                .column(Column::new("id", "bigint").primary_key())
                .column(Column::new("user_id", "bigint"))
                .foreign_key(ForeignKey::new("fk_user", ["user_id"], "users", ["id"])),
            Table::new("audit", "events").column(Column::new("id", "bigint")),
        ])
        .with_engine(Engine::Postgres);
        snapshot.views.push(TableKey::new("public", "active_users"));
        snapshot
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");

        let snapshot = shop();
        snapshot.save(&path).unwrap();
        let loaded = SchemaSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaSnapshot::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, DiffError::Io(_)));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"tables\": [{\"schema\": 1}]}").unwrap();
        assert!(matches!(
            SchemaSnapshot::load(&path),
            Err(DiffError::Serialization(_))
        ));
    }

    #[test]
    fn test_minimal_document() {
        let snapshot = SchemaSnapshot::from_json_str(
            r#"{"tables": [{"name": "t", "columns": [{"name": "a", "data_type": "int"}]}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.engine, None);
        let column = &snapshot.tables[0].columns[0];
        assert_eq!(snapshot.tables[0].schema, "");
        assert!(column.nullable);
        assert!(column.default_value.is_none());
    }

    #[test]
    fn test_engine_is_serialized_lowercase() {
        let json = SchemaSnapshot::default().with_engine(Engine::Mariadb).to_json_pretty().unwrap();
        assert!(json.contains("\"engine\": \"mariadb\""));
    }

    #[test]
    fn test_introspector_lists_tables_and_views() {
        let snapshot = shop();
        let infos = snapshot.tables("public").unwrap();
        assert_eq!(
            infos,
            vec![
                TableInfo::table("users"),
                TableInfo::table("orders"),
                TableInfo::view("active_users"),
            ]
        );

        let tables = collect_tables(&snapshot, "public").unwrap();
        assert_eq!(tables, snapshot.tables_in("public"));
        assert_eq!(snapshot.schemas(), vec!["audit", "public"]);
    }

    #[test]
    fn test_table_not_found() {
        let err = shop().table_schema("public", "missing").unwrap_err();
        assert_eq!(err.to_string(), "Table public.missing not found");
    }
}
