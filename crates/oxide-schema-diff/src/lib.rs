//! Schema diffing and migration planning for relational databases.
//!
//! `oxide-schema-diff` compares two snapshots of a database schema, the
//! desired one (`source`) and the current one (`target`), and produces
//! everything needed to migrate between them:
//! - one typed [`DiffItem`] per added, removed or modified table, column,
//!   index and foreign key
//! - ready-to-run SQL for each item, for PostgreSQL, MySQL, MariaDB or
//!   SQLite
//! - a dependency-safe execution order and the resulting script
//!
//! # Architecture
//!
//! - **Schema** - engine-agnostic `Table`/`Column`/`Index`/`ForeignKey`
//!   values as introspection reports them
//! - **Diff** - matches both sides by name and emits `DiffItem`s
//! - **Dialect** - turns each item into SQL for one engine, or refuses
//!   with `UnsupportedOperation`
//! - **Planner** - sorts items by a fixed rank table and checks the
//!   order before rendering the script
//! - **Snapshot** - JSON files that stand in for a live database
//!
//! The engine is pure: no I/O, no shared state, and every call either
//! returns a complete [`SchemaDiff`] or an error.
//!
//! # Example
//!
//! ```rust
//! use oxide_schema_diff::prelude::*;
//!
//! let current = vec![
//!     Table::new("", "users")
//!         .column(Column::new("id", "bigint").primary_key())
//!         .column(Column::new("name", "varchar")),
//! ];
//! let desired = vec![
//!     Table::new("", "users")
//!         .column(Column::new("id", "bigint").primary_key())
//!         .column(Column::new("name", "varchar"))
//!         .column(Column::new("email", "varchar")),
//! ];
//!
//! let diff = compare_schemas(&desired, &current, Engine::Postgres).unwrap();
//! assert_eq!(diff.summary.columns_added, 1);
//! assert_eq!(diff.script, "ALTER TABLE \"users\" ADD COLUMN \"email\" varchar;\n");
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Summarize the differences between two snapshots
//! oxide-schema-diff diff --source desired.json --target current.json
//!
//! # Write the MySQL migration script
//! oxide-schema-diff --engine mysql sql --source desired.json --target current.json -o up.sql
//! ```

#![warn(missing_docs)]

pub mod compare;
pub mod dialect;
pub mod diff;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod normalize;
pub mod planner;
pub mod schema;
pub mod snapshot;

pub use compare::{SchemaComparer, SchemaDiff, compare_schemas};
pub use diff::{DiffItem, DiffSummary, DiffType, SchemaObject};
pub use engine::Engine;
pub use error::{DiffError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::compare::{SchemaComparer, SchemaDiff, compare_schemas};
    pub use crate::dialect::{
        MigrationDialect, MysqlDialect, PostgresDialect, SqliteDialect, build_sql, dialect_for,
    };
    pub use crate::diff::{ColumnChanges, DiffItem, DiffSummary, DiffType, SchemaObject};
    pub use crate::engine::Engine;
    pub use crate::error::{DiffError, Result};
    pub use crate::introspect::{SchemaIntrospector, TableInfo, TableKind, collect_tables};
    pub use crate::normalize::{ExactTypes, PostgresTypeAliases, TypeNormalizer};
    pub use crate::planner::{MigrationPlan, PlanContext, plan};
    pub use crate::schema::{Column, ForeignKey, Index, Table, TableKey};
    pub use crate::snapshot::SchemaSnapshot;
}
