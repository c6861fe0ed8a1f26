//! The comparison entry point.
//!
//! [`SchemaComparer`] runs the diff engine and the planner for one
//! engine and returns a [`SchemaDiff`]: the ordered items, their counts
//! and the executable script. A comparer holds no state between calls,
//! so one instance can serve any number of comparisons, concurrently
//! if needed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diff::{DiffItem, DiffSummary, diff_tables};
use crate::dialect::{MigrationDialect, dialect_for};
use crate::engine::Engine;
use crate::error::Result;
use crate::normalize::{ExactTypes, TypeNormalizer};
use crate::planner::{PlanContext, plan};
use crate::schema::Table;

/// Result of comparing two table sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Engine the SQL was generated for.
    pub engine: Engine,
    /// Items in execution order.
    pub items: Vec<DiffItem>,
    /// Item counts per type.
    pub summary: DiffSummary,
    /// The whole migration, one terminated statement per line.
    pub script: String,
}

impl SchemaDiff {
    /// Returns `true` if the schemas are identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns every statement in execution order, without terminators.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .flat_map(|item| item.migration_sql.iter().map(String::as_str))
    }
}

/// Compares table sets and plans the migration for one engine.
pub struct SchemaComparer {
    engine: Engine,
    dialect: Box<dyn MigrationDialect>,
    normalizer: Box<dyn TypeNormalizer>,
}

impl fmt::Debug for SchemaComparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaComparer")
            .field("engine", &self.engine)
            .field("normalizer", &self.normalizer.name())
            .finish_non_exhaustive()
    }
}

impl SchemaComparer {
    /// Creates a comparer for `engine` with exact type comparison.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            dialect: dialect_for(engine),
            normalizer: Box::new(ExactTypes),
        }
    }

    /// Compares column types through `normalizer` instead of exactly.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: impl TypeNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Returns the engine SQL is generated for.
    #[must_use]
    pub const fn engine(&self) -> Engine {
        self.engine
    }

    /// Returns the dialect SQL is generated with.
    #[must_use]
    pub fn dialect(&self) -> &dyn MigrationDialect {
        self.dialect.as_ref()
    }

    /// Computes the migration that turns `target` (current) into
    /// `source` (desired).
    ///
    /// Either the whole diff is returned or an error; nothing partial.
    ///
    /// # Errors
    ///
    /// - [`DiffError::DuplicateTableIdentity`](crate::DiffError::DuplicateTableIdentity)
    ///   if either side repeats a `(schema, name)`.
    /// - [`DiffError::InvalidSchemaObject`](crate::DiffError::InvalidSchemaObject)
    ///   if a table is malformed.
    /// - [`DiffError::UnsupportedOperation`](crate::DiffError::UnsupportedOperation)
    ///   if the engine cannot express a change.
    /// - [`DiffError::OrderingViolation`](crate::DiffError::OrderingViolation)
    ///   if no safe order exists under the fixed ranking.
    pub fn compare(&self, source: &[Table], target: &[Table]) -> Result<SchemaDiff> {
        let items = diff_tables(source, target, self.dialect.as_ref(), self.normalizer.as_ref())?;
        let planned = plan(
            items,
            &PlanContext::new(source, target),
            self.dialect.statement_terminator(),
        )?;
        let summary = DiffSummary::from_items(&planned.items);

        info!(
            engine = %self.engine,
            normalizer = self.normalizer.name(),
            items = planned.items.len(),
            %summary,
            "compared schemas"
        );

        Ok(SchemaDiff {
            engine: self.engine,
            items: planned.items,
            summary,
            script: planned.script,
        })
    }
}

/// Compares `source` (desired) against `target` (current) for `engine`
/// with exact type comparison.
///
/// # Errors
///
/// See [`SchemaComparer::compare`].
pub fn compare_schemas(source: &[Table], target: &[Table], engine: Engine) -> Result<SchemaDiff> {
    SchemaComparer::new(engine).compare(source, target)
}
