//! Diff computation between two sets of tables.
//!
//! `source` is the desired schema and `target` the current one. The
//! result is an unordered list of [`DiffItem`]s, each carrying the SQL
//! that implements it for one engine. Use [`crate::planner`] to put the
//! items in a safe execution order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialect::MigrationDialect;
use crate::error::{DiffError, Result};
use crate::normalize::TypeNormalizer;
use crate::schema::{Column, ForeignKey, Index, Table, TableKey};

/// The kind of structural difference a [`DiffItem`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    /// Table exists only in the source.
    TableAdded,
    /// Table exists only in the target.
    TableRemoved,
    /// Column exists only in the source.
    ColumnAdded,
    /// Column exists only in the target.
    ColumnRemoved,
    /// Column type, nullability or default differs.
    ColumnModified,
    /// Index exists only in the source.
    IndexAdded,
    /// Index exists only in the target.
    IndexRemoved,
    /// Index columns or uniqueness differ.
    IndexModified,
    /// Foreign key exists only in the source.
    FkAdded,
    /// Foreign key exists only in the target.
    FkRemoved,
    /// Foreign key columns or referenced table differ.
    FkModified,
}

/// What a diff item does to its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The object is created.
    Added,
    /// The object is dropped.
    Removed,
    /// The object is altered.
    Modified,
}

impl DiffType {
    /// All diff types, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::TableAdded,
        Self::TableRemoved,
        Self::ColumnAdded,
        Self::ColumnRemoved,
        Self::ColumnModified,
        Self::IndexAdded,
        Self::IndexRemoved,
        Self::IndexModified,
        Self::FkAdded,
        Self::FkRemoved,
        Self::FkModified,
    ];

    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TableAdded => "table_added",
            Self::TableRemoved => "table_removed",
            Self::ColumnAdded => "column_added",
            Self::ColumnRemoved => "column_removed",
            Self::ColumnModified => "column_modified",
            Self::IndexAdded => "index_added",
            Self::IndexRemoved => "index_removed",
            Self::IndexModified => "index_modified",
            Self::FkAdded => "fk_added",
            Self::FkRemoved => "fk_removed",
            Self::FkModified => "fk_modified",
        }
    }

    /// Returns whether the item creates, drops or alters its object.
    #[must_use]
    pub const fn change(self) -> ChangeKind {
        match self {
            Self::TableAdded | Self::ColumnAdded | Self::IndexAdded | Self::FkAdded => {
                ChangeKind::Added
            }
            Self::TableRemoved | Self::ColumnRemoved | Self::IndexRemoved | Self::FkRemoved => {
                ChangeKind::Removed
            }
            Self::ColumnModified | Self::IndexModified | Self::FkModified => ChangeKind::Modified,
        }
    }

    /// Returns `true` for `table_added` and `table_removed`.
    #[must_use]
    pub const fn is_table_level(self) -> bool {
        matches!(self, Self::TableAdded | Self::TableRemoved)
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the object a diff item refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaObject {
    /// A whole table.
    Table(Table),
    /// A single column.
    Column(Column),
    /// An index.
    Index(Index),
    /// A foreign key constraint.
    ForeignKey(ForeignKey),
}

impl SchemaObject {
    /// Returns the table, if this is one.
    #[must_use]
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the column, if this is one.
    #[must_use]
    pub const fn as_column(&self) -> Option<&Column> {
        match self {
            Self::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the index, if this is one.
    #[must_use]
    pub const fn as_index(&self) -> Option<&Index> {
        match self {
            Self::Index(i) => Some(i),
            _ => None,
        }
    }

    /// Returns the foreign key, if this is one.
    #[must_use]
    pub const fn as_foreign_key(&self) -> Option<&ForeignKey> {
        match self {
            Self::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// One atomic, typed structural difference between two schema snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    /// What kind of difference this is.
    #[serde(rename = "type")]
    pub diff_type: DiffType,
    /// Table the difference belongs to.
    pub table: TableKey,
    /// Column, index or foreign key name; absent for table-level items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Desired definition (populated for added and modified items).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SchemaObject>,
    /// Current definition (populated for removed and modified items).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SchemaObject>,
    /// Ready-to-execute statements, without terminators.
    #[serde(default)]
    pub migration_sql: Vec<String>,
    /// Set on index and foreign key items synthesized for a table that
    /// is itself being added or removed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub implied_by_table: bool,
}

impl DiffItem {
    /// Creates an item for an object that only exists in the source.
    #[must_use]
    pub fn added(diff_type: DiffType, table: TableKey, name: Option<String>, source: SchemaObject) -> Self {
        Self {
            diff_type,
            table,
            name,
            source: Some(source),
            target: None,
            migration_sql: Vec::new(),
            implied_by_table: false,
        }
    }

    /// Creates an item for an object that only exists in the target.
    #[must_use]
    pub fn removed(diff_type: DiffType, table: TableKey, name: Option<String>, target: SchemaObject) -> Self {
        Self {
            diff_type,
            table,
            name,
            source: None,
            target: Some(target),
            migration_sql: Vec::new(),
            implied_by_table: false,
        }
    }

    /// Creates an item for an object present on both sides with differences.
    #[must_use]
    pub fn modified(
        diff_type: DiffType,
        table: TableKey,
        name: String,
        source: SchemaObject,
        target: SchemaObject,
    ) -> Self {
        Self {
            diff_type,
            table,
            name: Some(name),
            source: Some(source),
            target: Some(target),
            migration_sql: Vec::new(),
            implied_by_table: false,
        }
    }

    #[must_use]
    fn implied(mut self) -> Self {
        self.implied_by_table = true;
        self
    }

    /// Checks that the populated fields match the item's type.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::InvalidSchemaObject`] if `source`/`target` or
    /// `name` are populated inconsistently with [`DiffItem::diff_type`].
    pub fn check_shape(&self) -> Result<()> {
        let (want_source, want_target) = match self.diff_type.change() {
            ChangeKind::Added => (true, false),
            ChangeKind::Removed => (false, true),
            ChangeKind::Modified => (true, true),
        };
        let object = self.name.as_deref().unwrap_or("<table>");
        if self.source.is_some() != want_source || self.target.is_some() != want_target {
            return Err(DiffError::invalid(
                &self.table,
                object,
                format!("{} item has mismatched source/target snapshots", self.diff_type),
            ));
        }
        if self.diff_type.is_table_level() == self.name.is_some() {
            return Err(DiffError::invalid(
                &self.table,
                object,
                format!("{} item has an unexpected name field", self.diff_type),
            ));
        }
        if self.diff_type.change() == ChangeKind::Modified && self.source == self.target {
            return Err(DiffError::invalid(
                &self.table,
                object,
                "modified item has identical source and target",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for DiffItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.diff_type, self.table)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

/// Counts of diff items per entity kind and change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Number of `table_added` items.
    pub tables_added: usize,
    /// Number of `table_removed` items.
    pub tables_removed: usize,
    /// Number of `column_added` items.
    pub columns_added: usize,
    /// Number of `column_removed` items.
    pub columns_removed: usize,
    /// Number of `column_modified` items.
    pub columns_modified: usize,
    /// Number of `index_added` items, implied ones included.
    pub indexes_added: usize,
    /// Number of `index_removed` items, implied ones included.
    pub indexes_removed: usize,
    /// Number of `index_modified` items.
    pub indexes_modified: usize,
    /// Number of `fk_added` items, implied ones included.
    pub foreign_keys_added: usize,
    /// Number of `fk_removed` items, implied ones included.
    pub foreign_keys_removed: usize,
    /// Number of `fk_modified` items.
    pub foreign_keys_modified: usize,
}

impl DiffSummary {
    /// Tallies a list of items.
    #[must_use]
    pub fn from_items(items: &[DiffItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            *summary.slot(item.diff_type) += 1;
        }
        summary
    }

    fn slot(&mut self, diff_type: DiffType) -> &mut usize {
        match diff_type {
            DiffType::TableAdded => &mut self.tables_added,
            DiffType::TableRemoved => &mut self.tables_removed,
            DiffType::ColumnAdded => &mut self.columns_added,
            DiffType::ColumnRemoved => &mut self.columns_removed,
            DiffType::ColumnModified => &mut self.columns_modified,
            DiffType::IndexAdded => &mut self.indexes_added,
            DiffType::IndexRemoved => &mut self.indexes_removed,
            DiffType::IndexModified => &mut self.indexes_modified,
            DiffType::FkAdded => &mut self.foreign_keys_added,
            DiffType::FkRemoved => &mut self.foreign_keys_removed,
            DiffType::FkModified => &mut self.foreign_keys_modified,
        }
    }

    /// Returns the count for one diff type.
    #[must_use]
    pub const fn count(&self, diff_type: DiffType) -> usize {
        match diff_type {
            DiffType::TableAdded => self.tables_added,
            DiffType::TableRemoved => self.tables_removed,
            DiffType::ColumnAdded => self.columns_added,
            DiffType::ColumnRemoved => self.columns_removed,
            DiffType::ColumnModified => self.columns_modified,
            DiffType::IndexAdded => self.indexes_added,
            DiffType::IndexRemoved => self.indexes_removed,
            DiffType::IndexModified => self.indexes_modified,
            DiffType::FkAdded => self.foreign_keys_added,
            DiffType::FkRemoved => self.foreign_keys_removed,
            DiffType::FkModified => self.foreign_keys_modified,
        }
    }

    /// Total number of items.
    #[must_use]
    pub fn total(&self) -> usize {
        DiffType::ALL.iter().map(|t| self.count(*t)).sum()
    }

    /// Returns `true` if every count is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let mut parts = Vec::new();
        for diff_type in DiffType::ALL {
            let n = self.count(diff_type);
            if n == 0 {
                continue;
            }
            let noun = match (diff_type, n) {
                (DiffType::TableAdded | DiffType::TableRemoved, 1) => "table",
                (DiffType::TableAdded | DiffType::TableRemoved, _) => "tables",
                (DiffType::ColumnAdded | DiffType::ColumnRemoved | DiffType::ColumnModified, 1) => {
                    "column"
                }
                (DiffType::ColumnAdded | DiffType::ColumnRemoved | DiffType::ColumnModified, _) => {
                    "columns"
                }
                (DiffType::IndexAdded | DiffType::IndexRemoved | DiffType::IndexModified, 1) => {
                    "index"
                }
                (DiffType::IndexAdded | DiffType::IndexRemoved | DiffType::IndexModified, _) => {
                    "indexes"
                }
                (_, 1) => "foreign key",
                (_, _) => "foreign keys",
            };
            let verb = match diff_type.change() {
                ChangeKind::Added => "added",
                ChangeKind::Removed => "removed",
                ChangeKind::Modified => "modified",
            };
            parts.push(format!("{n} {noun} {verb}"));
        }
        f.write_str(&parts.join(", "))
    }
}

// ================================================================
// Diff computation
// ================================================================

/// Indexes one side's tables by identity, validating each table.
fn index_tables<'a>(side: &'static str, tables: &'a [Table]) -> Result<BTreeMap<TableKey, &'a Table>> {
    let mut map = BTreeMap::new();
    for table in tables {
        table.validate()?;
        let key = table.key();
        if map.contains_key(&key) {
            return Err(DiffError::DuplicateTableIdentity { side, table: key });
        }
        map.insert(key, table);
    }
    Ok(map)
}

/// Compares `source` (desired) against `target` (current) and returns
/// every difference with its SQL built by `dialect`.
///
/// Item order is not meaningful; pass the result through
/// [`crate::planner::plan`] before executing anything.
///
/// # Errors
///
/// - [`DiffError::DuplicateTableIdentity`] if either side repeats a table.
/// - [`DiffError::InvalidSchemaObject`] if any table fails validation.
/// - [`DiffError::UnsupportedOperation`] if the dialect cannot express an item.
pub fn diff_tables(
    source: &[Table],
    target: &[Table],
    dialect: &dyn MigrationDialect,
    normalizer: &dyn TypeNormalizer,
) -> Result<Vec<DiffItem>> {
    let source_tables = index_tables("source", source)?;
    let target_tables = index_tables("target", target)?;

    let mut items = Vec::new();

    for (key, table) in &source_tables {
        if target_tables.contains_key(key) {
            continue;
        }
        debug!(table = %key, "table only in source");
        items.push(DiffItem::added(
            DiffType::TableAdded,
            key.clone(),
            None,
            SchemaObject::Table((*table).clone()),
        ));
        for idx in &table.indexes {
            items.push(index_added(key, idx).implied());
        }
        for fk in &table.foreign_keys {
            items.push(fk_added(key, fk).implied());
        }
    }

    for (key, table) in &target_tables {
        if source_tables.contains_key(key) {
            continue;
        }
        debug!(table = %key, "table only in target");
        items.push(DiffItem::removed(
            DiffType::TableRemoved,
            key.clone(),
            None,
            SchemaObject::Table((*table).clone()),
        ));
        for idx in &table.indexes {
            items.push(index_removed(key, idx).implied());
        }
        for fk in &table.foreign_keys {
            items.push(fk_removed(key, fk).implied());
        }
    }

    for (key, desired) in &source_tables {
        if let Some(current) = target_tables.get(key) {
            let before = items.len();
            diff_columns(key, desired, current, normalizer, &mut items);
            diff_indexes(key, desired, current, &mut items);
            diff_foreign_keys(key, desired, current, &mut items);
            debug!(table = %key, changes = items.len() - before, "compared table");
        }
    }

    for item in &mut items {
        item.migration_sql = dialect.generate_sql_with(item, normalizer)?;
        if item.migration_sql.is_empty() {
            if item.implied_by_table {
                debug!(item = %item, "covered by table statement");
            } else {
                warn!(item = %item, engine = %dialect.engine(), "no SQL generated");
            }
        }
    }

    Ok(items)
}

fn index_added(table: &TableKey, idx: &Index) -> DiffItem {
    DiffItem::added(
        DiffType::IndexAdded,
        table.clone(),
        Some(idx.name.clone()),
        SchemaObject::Index(idx.clone()),
    )
}

fn index_removed(table: &TableKey, idx: &Index) -> DiffItem {
    DiffItem::removed(
        DiffType::IndexRemoved,
        table.clone(),
        Some(idx.name.clone()),
        SchemaObject::Index(idx.clone()),
    )
}

fn fk_added(table: &TableKey, fk: &ForeignKey) -> DiffItem {
    DiffItem::added(
        DiffType::FkAdded,
        table.clone(),
        Some(fk.name.clone()),
        SchemaObject::ForeignKey(fk.clone()),
    )
}

fn fk_removed(table: &TableKey, fk: &ForeignKey) -> DiffItem {
    DiffItem::removed(
        DiffType::FkRemoved,
        table.clone(),
        Some(fk.name.clone()),
        SchemaObject::ForeignKey(fk.clone()),
    )
}

/// Pairs up named objects from both sides: `(only_source, only_target, both)`.
#[allow(clippy::type_complexity)]
fn match_by_name<'a, T>(
    source: &'a [T],
    target: &'a [T],
    name: impl Fn(&T) -> &str,
) -> (Vec<&'a T>, Vec<&'a T>, Vec<(&'a T, &'a T)>) {
    let source_map: BTreeMap<&str, &T> = source.iter().map(|o| (name(o), o)).collect();
    let target_map: BTreeMap<&str, &T> = target.iter().map(|o| (name(o), o)).collect();

    let source_names: BTreeSet<&str> = source_map.keys().copied().collect();
    let target_names: BTreeSet<&str> = target_map.keys().copied().collect();

    let only_source = source_names
        .difference(&target_names)
        .map(|n| source_map[n])
        .collect();
    let only_target = target_names
        .difference(&source_names)
        .map(|n| target_map[n])
        .collect();
    let both = source_names
        .intersection(&target_names)
        .map(|n| (source_map[n], target_map[n]))
        .collect();

    (only_source, only_target, both)
}

/// The fields that differ between two versions of a column.
///
/// Primary-key membership is not compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnChanges {
    /// The types differ after normalization.
    pub data_type: bool,
    /// Nullability differs.
    pub nullable: bool,
    /// The default differs.
    pub default_value: bool,
}

impl ColumnChanges {
    /// Compares `from` and `to`, treating types `normalizer` considers
    /// equivalent as unchanged.
    #[must_use]
    pub fn between(from: &Column, to: &Column, normalizer: &dyn TypeNormalizer) -> Self {
        Self {
            data_type: !normalizer.equivalent(&from.data_type, &to.data_type),
            nullable: from.nullable != to.nullable,
            default_value: from.default_value != to.default_value,
        }
    }

    /// Returns `true` if any field changed.
    #[must_use]
    pub const fn any(self) -> bool {
        self.data_type || self.nullable || self.default_value
    }
}

fn diff_columns(
    key: &TableKey,
    desired: &Table,
    current: &Table,
    normalizer: &dyn TypeNormalizer,
    items: &mut Vec<DiffItem>,
) {
    let (added, removed, common) =
        match_by_name(&desired.columns, &current.columns, |c| c.name.as_str());

    for col in added {
        items.push(DiffItem::added(
            DiffType::ColumnAdded,
            key.clone(),
            Some(col.name.clone()),
            SchemaObject::Column(col.clone()),
        ));
    }
    for col in removed {
        items.push(DiffItem::removed(
            DiffType::ColumnRemoved,
            key.clone(),
            Some(col.name.clone()),
            SchemaObject::Column(col.clone()),
        ));
    }
    for (new_col, old_col) in common {
        if ColumnChanges::between(old_col, new_col, normalizer).any() {
            items.push(DiffItem::modified(
                DiffType::ColumnModified,
                key.clone(),
                new_col.name.clone(),
                SchemaObject::Column(new_col.clone()),
                SchemaObject::Column(old_col.clone()),
            ));
        }
    }
}

/// Column order is significant for composite indexes.
fn indexes_differ(a: &Index, b: &Index) -> bool {
    a.columns != b.columns || a.is_unique != b.is_unique
}

fn diff_indexes(key: &TableKey, desired: &Table, current: &Table, items: &mut Vec<DiffItem>) {
    let (added, removed, common) =
        match_by_name(&desired.indexes, &current.indexes, |i| i.name.as_str());

    for idx in added {
        items.push(index_added(key, idx));
    }
    for idx in removed {
        items.push(index_removed(key, idx));
    }
    for (new_idx, old_idx) in common {
        if indexes_differ(new_idx, old_idx) {
            items.push(DiffItem::modified(
                DiffType::IndexModified,
                key.clone(),
                new_idx.name.clone(),
                SchemaObject::Index(new_idx.clone()),
                SchemaObject::Index(old_idx.clone()),
            ));
        }
    }
}

/// Referenced schemas are compared after resolving an empty schema to
/// the owning table's.
fn foreign_keys_differ(owner: &TableKey, a: &ForeignKey, b: &ForeignKey) -> bool {
    a.columns != b.columns
        || a.referenced_key(owner) != b.referenced_key(owner)
        || a.referenced_columns != b.referenced_columns
}

fn diff_foreign_keys(key: &TableKey, desired: &Table, current: &Table, items: &mut Vec<DiffItem>) {
    let (added, removed, common) =
        match_by_name(&desired.foreign_keys, &current.foreign_keys, |fk| fk.name.as_str());

    for fk in added {
        items.push(fk_added(key, fk));
    }
    for fk in removed {
        items.push(fk_removed(key, fk));
    }
    for (new_fk, old_fk) in common {
        if foreign_keys_differ(key, new_fk, old_fk) {
            items.push(DiffItem::modified(
                DiffType::FkModified,
                key.clone(),
                new_fk.name.clone(),
                SchemaObject::ForeignKey(new_fk.clone()),
                SchemaObject::ForeignKey(old_fk.clone()),
            ));
        }
    }
}
