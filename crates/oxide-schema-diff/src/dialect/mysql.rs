//! MySQL and MariaDB dialects for migrations.
//!
//! Both use backtick identifiers, rewrite a column with a single
//! `MODIFY COLUMN`, and drop foreign keys with `DROP FOREIGN KEY`.
//! MySQL additionally requires expression defaults in parentheses.

use super::{MigrationDialect, is_function_call, is_verbatim_default};
use crate::diff::ColumnChanges;
use crate::engine::Engine;
use crate::schema::{Column, TableKey};

/// Which server family a [`MysqlDialect`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MysqlFlavor {
    /// Oracle MySQL 8+.
    #[default]
    Mysql,
    /// MariaDB.
    Mariadb,
}

/// MySQL / MariaDB dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect {
    flavor: MysqlFlavor,
}

/// Functions MySQL accepts as a bare column default.
const BARE_DEFAULT_FUNCTIONS: &[&str] = &["now", "current_timestamp", "localtime", "localtimestamp"];

impl MysqlDialect {
    /// Creates a MySQL dialect.
    #[must_use]
    pub const fn mysql() -> Self {
        Self {
            flavor: MysqlFlavor::Mysql,
        }
    }

    /// Creates a MariaDB dialect.
    #[must_use]
    pub const fn mariadb() -> Self {
        Self {
            flavor: MysqlFlavor::Mariadb,
        }
    }

    /// Returns the server family.
    #[must_use]
    pub const fn flavor(&self) -> MysqlFlavor {
        self.flavor
    }
}

impl MigrationDialect for MysqlDialect {
    fn engine(&self) -> Engine {
        match self.flavor {
            MysqlFlavor::Mysql => Engine::Mysql,
            MysqlFlavor::Mariadb => Engine::Mariadb,
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn render_default(&self, value: &str) -> String {
        let trimmed = value.trim();
        if !is_verbatim_default(trimmed, self.backslash_escapes()) {
            return self.quote_literal(value);
        }
        if self.flavor == MysqlFlavor::Mysql && is_function_call(trimmed, self.backslash_escapes()) {
            let name = trimmed
                .split('(')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            if !BARE_DEFAULT_FUNCTIONS.contains(&name.as_str()) {
                return format!("({trimmed})");
            }
        }
        trimmed.to_string()
    }

    fn alter_column(&self, table: &TableKey, to: &Column, _changes: ColumnChanges) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.qualified_table(table),
            self.column_definition(to, false)
        )]
    }

    fn drop_index(&self, table: &TableKey, index: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(index),
            self.qualified_table(table)
        )
    }

    fn drop_foreign_key(&self, table: &TableKey, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.qualified_table(table),
            self.quote_identifier(name)
        )
    }
}
