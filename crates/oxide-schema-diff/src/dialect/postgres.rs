//! PostgreSQL dialect for migrations.
//!
//! PostgreSQL speaks the standard forms the trait emits: double-quoted
//! identifiers, one `ALTER COLUMN` clause per changed field, and
//! `DROP CONSTRAINT` for foreign keys.

use super::MigrationDialect;
use crate::engine::Engine;

/// PostgreSQL dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for PostgresDialect {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }
}
