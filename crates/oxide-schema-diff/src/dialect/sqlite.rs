//! SQLite dialect for migrations.
//!
//! SQLite has limited ALTER TABLE support: columns cannot be altered and
//! foreign keys can only be declared when the table is created. Changes
//! that need either are rejected with
//! [`DiffError::UnsupportedOperation`](crate::DiffError::UnsupportedOperation)
//! rather than emitted as invalid SQL; rewriting such a table is left to
//! the caller.

use super::MigrationDialect;
use crate::engine::Engine;
use crate::schema::{ForeignKey, Index, TableKey};

/// SQLite migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for SqliteDialect {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn supports_drop_constraint(&self) -> bool {
        false
    }

    // REFERENCES may not name a schema; the parent must live alongside.
    fn referenced_table(&self, _owner: &TableKey, fk: &ForeignKey) -> String {
        self.quote_identifier(&fk.referenced_table)
    }

    // The schema goes on the index name, never on the ON table.
    fn create_index(&self, table: &TableKey, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.qualified_table(&TableKey::new(table.schema.clone(), index.name.clone())),
            self.quote_identifier(&table.name),
            self.quote_list(&index.columns)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffItem, DiffType, SchemaObject};
    use crate::error::DiffError;
    use crate::schema::{Column, Table};

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    #[test]
    fn test_create_table_inlines_foreign_keys() {
        let table = Table::new("", "orders")
            .column(Column::new("id", "INTEGER").primary_key())
            .column(Column::new("user_id", "INTEGER").not_null())
            .foreign_key(ForeignKey::new("fk_user", ["user_id"], "users", ["id"]));

        assert_eq!(
            dialect().create_table(&table),
            "CREATE TABLE \"orders\" (\n    \"id\" INTEGER PRIMARY KEY,\n    \"user_id\" INTEGER NOT NULL,\n    CONSTRAINT \"fk_user\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\")\n)"
        );
    }

    #[test]
    fn test_references_are_unqualified() {
        let table = Table::new("main", "orders")
            .column(Column::new("user_id", "INTEGER"))
            .foreign_key(ForeignKey::new("fk_user", ["user_id"], "users", ["id"]));
        let sql = dialect().create_table(&table);
        assert!(sql.starts_with("CREATE TABLE \"main\".\"orders\""));
        assert!(sql.contains("REFERENCES \"users\" (\"id\")"));
    }

    #[test]
    fn test_index_name_carries_schema() {
        let d = dialect();
        let key = TableKey::new("main", "users");
        assert_eq!(
            d.create_index(&key, &Index::new("idx_email", ["email"]).unique()),
            "CREATE UNIQUE INDEX \"main\".\"idx_email\" ON \"users\" (\"email\")"
        );
        assert_eq!(
            d.create_index(&TableKey::new("", "users"), &Index::new("idx_email", ["email"])),
            "CREATE INDEX \"idx_email\" ON \"users\" (\"email\")"
        );
        assert_eq!(d.drop_index(&key, "idx_email"), "DROP INDEX \"main\".\"idx_email\"");
    }

    #[test]
    fn test_column_modified_is_unsupported() {
        let item = DiffItem::modified(
            DiffType::ColumnModified,
            TableKey::new("", "users"),
            "age".to_string(),
            SchemaObject::Column(Column::new("age", "INTEGER").not_null()),
            SchemaObject::Column(Column::new("age", "INTEGER")),
        );

        let err = dialect().generate_sql(&item).unwrap_err();
        assert!(matches!(
            err,
            DiffError::UnsupportedOperation {
                engine: Engine::Sqlite,
                operation: DiffType::ColumnModified,
                ..
            }
        ));
    }

    #[test]
    fn test_standalone_foreign_key_changes_are_unsupported() {
        let fk = ForeignKey::new("fk_user", ["user_id"], "users", ["id"]);
        let added = DiffItem::added(
            DiffType::FkAdded,
            TableKey::new("", "orders"),
            Some("fk_user".to_string()),
            SchemaObject::ForeignKey(fk.clone()),
        );
        let removed = DiffItem::removed(
            DiffType::FkRemoved,
            TableKey::new("", "orders"),
            Some("fk_user".to_string()),
            SchemaObject::ForeignKey(fk),
        );

        for item in [added, removed] {
            assert!(matches!(
                dialect().generate_sql(&item),
                Err(DiffError::UnsupportedOperation { .. })
            ));
        }
    }

    #[test]
    fn test_add_and_drop_column() {
        let d = dialect();
        let key = TableKey::new("", "users");
        assert_eq!(
            d.add_column(&key, &Column::new("bio", "TEXT").default_value("")),
            "ALTER TABLE \"users\" ADD COLUMN \"bio\" TEXT DEFAULT ''"
        );
        assert_eq!(d.drop_column(&key, "bio"), "ALTER TABLE \"users\" DROP COLUMN \"bio\"");
    }
}
