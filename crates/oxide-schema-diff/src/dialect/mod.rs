//! Dialect-specific SQL generation for diff items.
//!
//! Each dialect turns one [`DiffItem`] into the statement(s) that apply it
//! on a given engine. The trait's provided methods emit standard SQL;
//! implementations override what their engine spells differently and
//! declare what it cannot do at all.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::{MysqlDialect, MysqlFlavor};
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use tracing::debug;

use crate::diff::{ColumnChanges, DiffItem, DiffType, SchemaObject};
use crate::engine::Engine;
use crate::error::{DiffError, Result};
use crate::normalize::{ExactTypes, TypeNormalizer};
use crate::schema::{Column, ForeignKey, Index, Table, TableKey};

/// Trait for engine-specific migration SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the engine this dialect generates SQL for.
    fn engine(&self) -> Engine;

    /// Returns whether the engine can alter an existing column.
    fn supports_alter_column(&self) -> bool {
        true
    }

    /// Returns whether foreign keys can be added after table creation.
    fn supports_add_constraint(&self) -> bool {
        true
    }

    /// Returns whether foreign keys can be dropped from an existing table.
    fn supports_drop_constraint(&self) -> bool {
        true
    }

    /// Returns whether a backslash escapes the next character inside
    /// string literals.
    fn backslash_escapes(&self) -> bool {
        false
    }

    /// Terminator appended to each statement in a migration script.
    fn statement_terminator(&self) -> &'static str {
        ";"
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Returns the table name, schema-qualified when it has a schema.
    fn qualified_table(&self, table: &TableKey) -> String {
        if table.schema.is_empty() {
            self.quote_identifier(&table.name)
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(&table.schema),
                self.quote_identifier(&table.name)
            )
        }
    }

    /// Returns how a foreign key's target table is written in `REFERENCES`.
    fn referenced_table(&self, owner: &TableKey, fk: &ForeignKey) -> String {
        self.qualified_table(&fk.referenced_key(owner))
    }

    /// Renders a reported default value. Expressions and literals are
    /// emitted as-is; anything else is quoted as a string literal.
    fn render_default(&self, value: &str) -> String {
        if is_verbatim_default(value, self.backslash_escapes()) {
            value.trim().to_string()
        } else {
            self.quote_literal(value)
        }
    }

    /// Generates a column definition. `inline_primary_key` adds
    /// `PRIMARY KEY` to a primary key column.
    fn column_definition(&self, column: &Column, inline_primary_key: bool) -> String {
        let mut sql = format!("{} {}", self.quote_identifier(&column.name), column.data_type);

        let inline_pk = inline_primary_key && column.is_primary_key;
        if inline_pk {
            sql.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            sql.push_str(" NOT NULL");
        }

        if let Some(ref default) = column.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }

        sql
    }

    /// Generates the `FOREIGN KEY (...) REFERENCES ...` clause.
    fn foreign_key_clause(&self, owner: &TableKey, fk: &ForeignKey) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_list(&fk.columns),
            self.referenced_table(owner, fk),
            self.quote_list(&fk.referenced_columns)
        )
    }

    /// Quotes and comma-joins a list of identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates SQL for CREATE TABLE.
    ///
    /// A single primary key column is declared inline, a composite one as
    /// a table constraint. Foreign keys are only inlined on engines that
    /// cannot add them afterwards.
    fn create_table(&self, table: &Table) -> String {
        let key = table.key();
        let pk: Vec<String> = table.primary_key().map(|c| c.name.clone()).collect();
        let inline_pk = pk.len() == 1;

        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c, inline_pk)))
            .collect();

        if pk.len() > 1 {
            defs.push(format!("    PRIMARY KEY ({})", self.quote_list(&pk)));
        }

        if !self.supports_add_constraint() {
            for fk in &table.foreign_keys {
                defs.push(format!(
                    "    CONSTRAINT {} {}",
                    self.quote_identifier(&fk.name),
                    self.foreign_key_clause(&key, fk)
                ));
            }
        }

        format!(
            "CREATE TABLE {} (\n{}\n)",
            self.qualified_table(&key),
            defs.join(",\n")
        )
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &TableKey) -> String {
        format!("DROP TABLE {}", self.qualified_table(table))
    }

    /// Generates SQL for ADD COLUMN.
    fn add_column(&self, table: &TableKey, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualified_table(table),
            self.column_definition(column, false)
        )
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &TableKey, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.qualified_table(table),
            self.quote_identifier(column)
        )
    }

    /// Generates the statements that bring a column to `to`, given which
    /// of its fields changed.
    ///
    /// The default emits one standard `ALTER COLUMN` per changed field.
    fn alter_column(&self, table: &TableKey, to: &Column, changes: ColumnChanges) -> Vec<String> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.qualified_table(table),
            self.quote_identifier(&to.name)
        );
        let mut statements = Vec::new();

        if changes.data_type {
            statements.push(format!("{prefix} TYPE {}", to.data_type));
        }

        if changes.default_value {
            match &to.default_value {
                Some(value) => statements.push(format!(
                    "{prefix} SET DEFAULT {}",
                    self.render_default(value)
                )),
                None => statements.push(format!("{prefix} DROP DEFAULT")),
            }
        }

        if changes.nullable {
            if to.nullable {
                statements.push(format!("{prefix} DROP NOT NULL"));
            } else {
                statements.push(format!("{prefix} SET NOT NULL"));
            }
        }

        statements
    }

    /// Generates SQL for CREATE INDEX.
    fn create_index(&self, table: &TableKey, index: &Index) -> String {
        let mut sql = String::from("CREATE ");
        if index.is_unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.qualified_table(table));
        sql.push_str(" (");
        sql.push_str(&self.quote_list(&index.columns));
        sql.push(')');
        sql
    }

    /// Generates SQL for DROP INDEX. Indexes live in their table's schema.
    fn drop_index(&self, table: &TableKey, index: &str) -> String {
        format!(
            "DROP INDEX {}",
            self.qualified_table(&TableKey::new(table.schema.clone(), index))
        )
    }

    /// Generates SQL for adding a foreign key constraint.
    fn add_foreign_key(&self, table: &TableKey, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.qualified_table(table),
            self.quote_identifier(&fk.name),
            self.foreign_key_clause(table, fk)
        )
    }

    /// Generates SQL for dropping a foreign key constraint.
    fn drop_foreign_key(&self, table: &TableKey, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.qualified_table(table),
            self.quote_identifier(name)
        )
    }

    /// Generates the statements implementing one diff item.
    ///
    /// Implied index drops produce no SQL (`DROP TABLE` takes them along).
    /// On engines without constraint DDL, implied foreign key items also
    /// produce none; the key is inlined into `CREATE TABLE` or dropped with
    /// its table.
    ///
    /// # Errors
    ///
    /// - [`DiffError::InvalidSchemaObject`] if the item's fields don't
    ///   match its type.
    /// - [`DiffError::UnsupportedOperation`] if the engine cannot express
    ///   the change.
    fn generate_sql(&self, item: &DiffItem) -> Result<Vec<String>> {
        self.generate_sql_with(item, &ExactTypes)
    }

    /// Like [`generate_sql`](Self::generate_sql), but a column type change
    /// that `normalizer` considers cosmetic is left out of the SQL.
    ///
    /// # Errors
    ///
    /// Same as [`generate_sql`](Self::generate_sql).
    fn generate_sql_with(&self, item: &DiffItem, normalizer: &dyn TypeNormalizer) -> Result<Vec<String>> {
        item.check_shape()?;
        let table = &item.table;

        let statements = match item.diff_type {
            DiffType::TableAdded => vec![self.create_table(source(item, SchemaObject::as_table)?)],
            DiffType::TableRemoved => {
                target(item, SchemaObject::as_table)?;
                vec![self.drop_table(table)]
            }
            DiffType::ColumnAdded => vec![self.add_column(table, source(item, SchemaObject::as_column)?)],
            DiffType::ColumnRemoved => {
                vec![self.drop_column(table, &target(item, SchemaObject::as_column)?.name)]
            }
            DiffType::ColumnModified => {
                let to = source(item, SchemaObject::as_column)?;
                let from = target(item, SchemaObject::as_column)?;
                if !self.supports_alter_column() {
                    return Err(unsupported(self.engine(), item));
                }
                self.alter_column(table, to, ColumnChanges::between(from, to, normalizer))
            }
            DiffType::IndexAdded => vec![self.create_index(table, source(item, SchemaObject::as_index)?)],
            DiffType::IndexRemoved => {
                let index = target(item, SchemaObject::as_index)?;
                if item.implied_by_table {
                    Vec::new()
                } else {
                    vec![self.drop_index(table, &index.name)]
                }
            }
            DiffType::IndexModified => {
                let new = source(item, SchemaObject::as_index)?;
                let old = target(item, SchemaObject::as_index)?;
                vec![self.drop_index(table, &old.name), self.create_index(table, new)]
            }
            DiffType::FkAdded => {
                let fk = source(item, SchemaObject::as_foreign_key)?;
                if self.supports_add_constraint() {
                    vec![self.add_foreign_key(table, fk)]
                } else if item.implied_by_table {
                    Vec::new()
                } else {
                    return Err(unsupported(self.engine(), item));
                }
            }
            DiffType::FkRemoved => {
                let fk = target(item, SchemaObject::as_foreign_key)?;
                if self.supports_drop_constraint() {
                    vec![self.drop_foreign_key(table, &fk.name)]
                } else if item.implied_by_table {
                    Vec::new()
                } else {
                    return Err(unsupported(self.engine(), item));
                }
            }
            DiffType::FkModified => {
                let new = source(item, SchemaObject::as_foreign_key)?;
                let old = target(item, SchemaObject::as_foreign_key)?;
                if !self.supports_drop_constraint() || !self.supports_add_constraint() {
                    return Err(unsupported(self.engine(), item));
                }
                vec![
                    self.drop_foreign_key(table, &old.name),
                    self.add_foreign_key(table, new),
                ]
            }
        };

        debug!(item = %item, statements = statements.len(), "generated SQL");
        Ok(statements)
    }
}

/// Returns the dialect for an engine.
#[must_use]
pub fn dialect_for(engine: Engine) -> Box<dyn MigrationDialect> {
    match engine {
        Engine::Postgres => Box::new(PostgresDialect::new()),
        Engine::Mysql => Box::new(MysqlDialect::mysql()),
        Engine::Mariadb => Box::new(MysqlDialect::mariadb()),
        Engine::Sqlite => Box::new(SqliteDialect::new()),
    }
}

/// Builds the SQL for a single diff item on the given engine.
///
/// # Errors
///
/// See [`MigrationDialect::generate_sql`].
pub fn build_sql(item: &DiffItem, engine: Engine) -> Result<Vec<String>> {
    dialect_for(engine).generate_sql(item)
}

fn unsupported(engine: Engine, item: &DiffItem) -> DiffError {
    DiffError::UnsupportedOperation {
        engine,
        operation: item.diff_type,
        table: item.table.to_string(),
        name: item.name.clone(),
    }
}

fn source<'a, T>(item: &'a DiffItem, pick: fn(&SchemaObject) -> Option<&T>) -> Result<&'a T> {
    snapshot(item, item.source.as_ref(), pick, "source")
}

fn target<'a, T>(item: &'a DiffItem, pick: fn(&SchemaObject) -> Option<&T>) -> Result<&'a T> {
    snapshot(item, item.target.as_ref(), pick, "target")
}

fn snapshot<'a, T>(
    item: &DiffItem,
    object: Option<&'a SchemaObject>,
    pick: fn(&SchemaObject) -> Option<&T>,
    side: &str,
) -> Result<&'a T> {
    object.and_then(pick).ok_or_else(|| {
        DiffError::invalid(
            &item.table,
            item.name.as_deref().unwrap_or("<table>"),
            format!("{} item has the wrong kind of {side} snapshot", item.diff_type),
        )
    })
}

/// Keywords that are valid default expressions on every supported engine.
const DEFAULT_KEYWORDS: &[&str] = &[
    "NULL",
    "TRUE",
    "FALSE",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIMESTAMP",
    "LOCALTIME",
];

/// Returns `true` if a reported default is already an SQL literal or
/// expression and can be emitted without quoting.
///
/// With `backslash_escapes`, `\` inside quoted text escapes the next
/// character, as it does on engines that read literals that way.
pub(crate) fn is_verbatim_default(value: &str, backslash_escapes: bool) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    if DEFAULT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(value)) {
        return true;
    }
    if is_numeric_literal(value) {
        return true;
    }
    if value.starts_with('(') && matching_close(value, 0, backslash_escapes) == Some(value.len() - 1) {
        return true;
    }
    if let Some(rest) = quoted_literal_rest(value, backslash_escapes) {
        return rest.is_empty() || is_cast(rest);
    }
    is_function_call(value, backslash_escapes)
}

fn is_numeric_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && digits.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && digits.parse::<f64>().is_ok()
}

/// For a value starting with a `'...'` literal, returns what follows the
/// closing quote. `''` inside the literal is an escaped quote.
fn quoted_literal_rest(value: &str, backslash_escapes: bool) -> Option<&str> {
    let body = value.strip_prefix('\'')?;
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if backslash_escapes => {
                chars.next();
            }
            '\'' => {
                if chars.peek().is_some_and(|(_, next)| *next == '\'') {
                    chars.next();
                    continue;
                }
                return Some(&body[i + 1..]);
            }
            _ => {}
        }
    }
    None
}

/// Byte offset of the `)` closing the `(` at `open`, skipping quoted text.
fn matching_close(value: &str, open: usize, backslash_escapes: bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut chars = value[open..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_quote && backslash_escapes => {
                chars.next();
            }
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A postgres `::type` cast suffix.
fn is_cast(rest: &str) -> bool {
    rest.strip_prefix("::").is_some_and(|ty| {
        !ty.trim().is_empty()
            && ty
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | '[' | ']' | ',' | '.' | '"'))
    })
}

/// `name(...)`, optionally followed by a `::type` cast.
pub(crate) fn is_function_call(value: &str, backslash_escapes: bool) -> bool {
    let Some(open) = value.find('(') else {
        return false;
    };
    let name = &value[..open];
    let Some(close) = matching_close(value, open, backslash_escapes) else {
        return false;
    };
    let rest = &value[close + 1..];
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && (rest.is_empty() || is_cast(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbatim_defaults() {
        for value in [
            "0",
            "-1.5",
            "1e3",
            "NULL",
            "true",
            "CURRENT_TIMESTAMP",
            "'active'",
            "'it''s'",
            "'active'::character varying",
            "now()",
            "nextval('users_id_seq'::regclass)",
            "gen_random_uuid()",
            "(datetime('now'))",
        ] {
            assert!(is_verbatim_default(value, false), "{value} should be verbatim");
        }
    }

    #[test]
    fn test_quoted_defaults() {
        for value in [
            "active",
            "it's",
            "'unterminated",
            "1 OR 1",
            "x'); DROP TABLE t; --",
            "f(1); DROP TABLE t; g(2)",
            "(1); DROP TABLE t; (2)",
            "'a'::text; DROP TABLE t",
            "",
        ] {
            assert!(!is_verbatim_default(value, false), "{value} should be quoted");
        }
    }

    #[test]
    fn test_backslash_mode_changes_literal_bounds() {
        let value = r"f('\', 'x); DROP TABLE t; -- ')";
        assert!(is_verbatim_default(value, false));
        assert!(!is_verbatim_default(value, true));

        assert!(is_verbatim_default(r"'it\'s'", true));
        assert!(!is_verbatim_default(r"'it\'s'", false));
    }

    #[test]
    fn test_render_default_escapes() {
        let d = PostgresDialect::new();
        assert_eq!(d.render_default("it's"), "'it''s'");
        assert_eq!(
            d.render_default("x'); DROP TABLE t; --"),
            "'x''); DROP TABLE t; --'"
        );
        assert_eq!(d.render_default(" 42 "), "42");
    }

    #[test]
    fn test_build_sql_checks_shape() {
        let item = DiffItem::added(
            DiffType::ColumnAdded,
            TableKey::new("", "users"),
            Some("email".to_string()),
            SchemaObject::Index(Index::new("email", ["email"])),
        );
        let err = build_sql(&item, Engine::Postgres).unwrap_err();
        assert!(matches!(err, DiffError::InvalidSchemaObject { .. }));
    }

    #[test]
    fn test_dialect_for_engine() {
        for engine in Engine::ALL {
            assert_eq!(dialect_for(engine).engine(), engine);
        }
    }
}
