//! Error types for schema comparison and migration planning.

use crate::diff::DiffType;
use crate::engine::Engine;
use crate::schema::TableKey;

/// Errors that can occur while comparing schemas or planning a migration.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The target engine cannot express a required DDL change.
    #[error("{engine} cannot express {operation} on {table}{}", .name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
    UnsupportedOperation {
        /// Engine the SQL was requested for.
        engine: Engine,
        /// The kind of change that cannot be expressed.
        operation: DiffType,
        /// Table the change applies to.
        table: String,
        /// Column, index or foreign key name, if any.
        name: Option<String>,
    },

    /// Two tables on the same side share a `(schema, name)` identity.
    #[error("Duplicate table identity {table} in {side} tables")]
    DuplicateTableIdentity {
        /// Which input contained the duplicate (`source` or `target`).
        side: &'static str,
        /// The duplicated identity.
        table: TableKey,
    },

    /// The planner produced an order that would violate a dependency.
    #[error("Ordering violation at {item}: {reason}")]
    OrderingViolation {
        /// Description of the offending diff item.
        item: String,
        /// Why the position is unsafe.
        reason: String,
    },

    /// A column, index, foreign key or table is malformed.
    #[error("Invalid schema object '{object}' on table {table}: {reason}")]
    InvalidSchemaObject {
        /// Table the object belongs to.
        table: String,
        /// Name of the offending object.
        object: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An introspection source has no such table.
    #[error("Table {0} not found")]
    TableNotFound(TableKey),

    /// An engine name could not be parsed.
    #[error("Unknown engine '{0}' (expected postgres, mysql, mariadb or sqlite)")]
    UnknownEngine(String),

    /// IO error (reading/writing snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiffError {
    pub(crate) fn invalid(
        table: impl ToString,
        object: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSchemaObject {
            table: table.to_string(),
            object: object.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for schema diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;
