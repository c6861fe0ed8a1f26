//! Migration planning: puts diff items in a dependency-safe order.
//!
//! Items are ranked by a fixed table keyed on [`DiffType`]: everything
//! that depends on a structure is removed before the structure is
//! altered or dropped, and new structures are created before anything
//! that depends on them. Ties are broken by table and object name so the
//! same input always yields the same script.
//!
//! After sorting, the plan is replayed against the tables and columns
//! that exist at each step. An item that would touch a table or column
//! which is not there yet (or any more) aborts planning with
//! [`DiffError::OrderingViolation`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::diff::{DiffItem, DiffType, SchemaObject};
use crate::error::{DiffError, Result};
use crate::schema::{Table, TableKey};

/// Execution rank per [`DiffType`], indexed in declaration order.
const RANKS: [u8; 11] = [
    6, // table_added
    5, // table_removed
    7, // column_added
    5, // column_removed
    5, // column_modified
    8, // index_added
    3, // index_removed
    4, // index_modified
    9, // fk_added
    1, // fk_removed
    2, // fk_modified
];

/// Returns the execution rank of a diff type. Lower runs first.
#[must_use]
pub const fn rank(diff_type: DiffType) -> u8 {
    RANKS[diff_type as usize]
}

/// `DROP TABLE` goes ahead of column changes sharing its rank.
const fn level(diff_type: DiffType) -> u8 {
    match diff_type {
        DiffType::TableRemoved => 0,
        _ => 1,
    }
}

/// Live tables and their columns at one point of the plan.
type LiveTables = BTreeMap<TableKey, BTreeSet<String>>;

/// Tables and columns the plan is checked against.
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    /// Column names of each table that exists before the migration runs.
    existing: LiveTables,
    /// Every table either side knows about. References outside this set
    /// are assumed to exist and are not checked.
    known: BTreeSet<TableKey>,
}

impl PlanContext {
    /// Builds the context for migrating `target` (current) to `source`
    /// (desired).
    #[must_use]
    pub fn new(source: &[Table], target: &[Table]) -> Self {
        let existing: LiveTables = target.iter().map(|t| (t.key(), column_names(t))).collect();
        let mut known: BTreeSet<TableKey> = existing.keys().cloned().collect();
        known.extend(source.iter().map(Table::key));
        Self { existing, known }
    }

    /// Returns whether `table` exists before the migration runs.
    #[must_use]
    pub fn exists(&self, table: &TableKey) -> bool {
        self.existing.contains_key(table)
    }

    /// Returns whether `table` has `column` before the migration runs.
    #[must_use]
    pub fn has_column(&self, table: &TableKey, column: &str) -> bool {
        self.existing.get(table).is_some_and(|c| c.contains(column))
    }
}

fn column_names(table: &Table) -> BTreeSet<String> {
    table.columns.iter().map(|c| c.name.clone()).collect()
}

/// An ordered migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Items in execution order.
    pub items: Vec<DiffItem>,
    /// Every statement of every item, each followed by the terminator and
    /// a newline.
    pub script: String,
}

/// Sorts `items` into execution order, checks the order against `ctx`
/// and renders the script.
///
/// # Errors
///
/// Returns [`DiffError::OrderingViolation`] if an item would run against
/// a table or column that does not exist at that point of the plan.
pub fn plan(mut items: Vec<DiffItem>, ctx: &PlanContext, terminator: &str) -> Result<MigrationPlan> {
    items.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    check_order(&items, ctx)?;
    let script = render_script(&items, terminator);
    debug!(items = items.len(), bytes = script.len(), "planned migration");
    Ok(MigrationPlan { items, script })
}

fn sort_key(item: &DiffItem) -> (u8, u8, &TableKey, Option<&str>, DiffType) {
    (
        rank(item.diff_type),
        level(item.diff_type),
        &item.table,
        item.name.as_deref(),
        item.diff_type,
    )
}

/// Joins every item's statements into one script.
#[must_use]
pub fn render_script(items: &[DiffItem], terminator: &str) -> String {
    let mut script = String::new();
    for statement in items.iter().flat_map(|item| &item.migration_sql) {
        script.push_str(statement);
        script.push_str(terminator);
        script.push('\n');
    }
    script
}

/// Replays `items` against the live tables and columns.
fn check_order(items: &[DiffItem], ctx: &PlanContext) -> Result<()> {
    let mut live = ctx.existing.clone();

    for item in items {
        match item.diff_type {
            DiffType::TableAdded => {
                let columns = item
                    .source
                    .as_ref()
                    .and_then(SchemaObject::as_table)
                    .map_or_else(BTreeSet::new, column_names);
                live.insert(item.table.clone(), columns);
            }
            DiffType::TableRemoved => {
                live.remove(&item.table);
            }
            DiffType::ColumnAdded => {
                require_live(&live, ctx, item, &item.table, "owning table")?;
                let added = item.source.as_ref().and_then(SchemaObject::as_column);
                if let (Some(columns), Some(column)) = (live.get_mut(&item.table), added) {
                    columns.insert(column.name.clone());
                }
            }
            DiffType::ColumnRemoved => {
                let removed = item.target.as_ref().and_then(SchemaObject::as_column);
                if let (Some(columns), Some(column)) = (live.get_mut(&item.table), removed) {
                    columns.remove(&column.name);
                }
            }
            DiffType::IndexAdded | DiffType::IndexModified => {
                require_live(&live, ctx, item, &item.table, "owning table")?;
                if let Some(index) = item.source.as_ref().and_then(SchemaObject::as_index) {
                    require_columns(&live, item, &item.table, &index.columns)?;
                }
            }
            DiffType::FkAdded | DiffType::FkModified => {
                require_live(&live, ctx, item, &item.table, "owning table")?;
                if let Some(fk) = item.source.as_ref().and_then(SchemaObject::as_foreign_key) {
                    let referenced = fk.referenced_key(&item.table);
                    require_live(&live, ctx, item, &referenced, "referenced table")?;
                    require_columns(&live, item, &item.table, &fk.columns)?;
                    require_columns(&live, item, &referenced, &fk.referenced_columns)?;
                }
            }
            DiffType::ColumnModified | DiffType::IndexRemoved | DiffType::FkRemoved => {}
        }
    }
    Ok(())
}

fn require_live(
    live: &LiveTables,
    ctx: &PlanContext,
    item: &DiffItem,
    table: &TableKey,
    role: &str,
) -> Result<()> {
    if !ctx.known.contains(table) || live.contains_key(table) {
        return Ok(());
    }
    Err(violation(
        item,
        format!("{role} {table} does not exist at this point of the plan"),
    ))
}

/// Checks `columns` against a live table. A table that is not live is
/// outside the comparison, or was already reported by [`require_live`].
fn require_columns(live: &LiveTables, item: &DiffItem, table: &TableKey, columns: &[String]) -> Result<()> {
    let Some(present) = live.get(table) else {
        return Ok(());
    };
    if let Some(missing) = columns.iter().find(|c| !present.contains(c.as_str())) {
        return Err(violation(
            item,
            format!("column {missing} of {table} does not exist at this point of the plan"),
        ));
    }
    Ok(())
}

fn violation(item: &DiffItem, reason: String) -> DiffError {
    error!(item = %item, %reason, "unsafe migration order");
    DiffError::OrderingViolation {
        item: item.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ForeignKey, Index};

    fn key(name: &str) -> TableKey {
        TableKey::new("", name)
    }

    fn item(diff_type: DiffType, table: &str, name: Option<&str>) -> DiffItem {
        let object = match diff_type {
            DiffType::TableAdded | DiffType::TableRemoved => SchemaObject::Table(
                Table::new("", table)
                    .column(Column::new("id", "int"))
                    .column(Column::new("c", "int")),
            ),
            DiffType::ColumnAdded | DiffType::ColumnRemoved | DiffType::ColumnModified => {
                SchemaObject::Column(Column::new(name.unwrap_or("c"), "int"))
            }
            DiffType::IndexAdded | DiffType::IndexRemoved | DiffType::IndexModified => {
                SchemaObject::Index(Index::new(name.unwrap_or("i"), ["c"]))
            }
            DiffType::FkAdded | DiffType::FkRemoved | DiffType::FkModified => {
                SchemaObject::ForeignKey(ForeignKey::new(name.unwrap_or("f"), ["c"], "parent", ["id"]))
            }
        };
        let mut item = DiffItem::added(diff_type, key(table), name.map(String::from), object.clone());
        item.target = Some(object);
        item.migration_sql = vec![format!("-- {diff_type} {table}")];
        item
    }

    /// Every existing table has columns `id` and `c`.
    fn ctx(existing: &[&str], known: &[&str]) -> PlanContext {
        PlanContext {
            existing: existing
                .iter()
                .map(|t| (key(t), BTreeSet::from(["id".to_string(), "c".to_string()])))
                .collect(),
            known: known.iter().chain(existing).map(|t| key(t)).collect(),
        }
    }

    fn index_on(table: &str, name: &str, columns: &[&str], diff_type: DiffType) -> DiffItem {
        let index = SchemaObject::Index(Index::new(name, columns.iter().copied()));
        let mut item = DiffItem::added(diff_type, key(table), Some(name.to_string()), index.clone());
        item.target = Some(index);
        item
    }

    fn fk_on(table: &str, columns: &[&str], referenced_columns: &[&str], diff_type: DiffType) -> DiffItem {
        let fk = SchemaObject::ForeignKey(ForeignKey::new(
            "fk",
            columns.iter().copied(),
            "parent",
            referenced_columns.iter().copied(),
        ));
        let mut item = DiffItem::added(diff_type, key(table), Some("fk".to_string()), fk.clone());
        item.target = Some(fk);
        item
    }

    #[test]
    fn test_rank_table() {
        assert_eq!(rank(DiffType::FkRemoved), 1);
        assert_eq!(rank(DiffType::FkModified), 2);
        assert_eq!(rank(DiffType::IndexRemoved), 3);
        assert_eq!(rank(DiffType::IndexModified), 4);
        assert_eq!(rank(DiffType::ColumnRemoved), 5);
        assert_eq!(rank(DiffType::ColumnModified), 5);
        assert_eq!(rank(DiffType::TableRemoved), 5);
        assert_eq!(rank(DiffType::TableAdded), 6);
        assert_eq!(rank(DiffType::ColumnAdded), 7);
        assert_eq!(rank(DiffType::IndexAdded), 8);
        assert_eq!(rank(DiffType::FkAdded), 9);
    }

    #[test]
    fn test_sort_by_rank_then_table_then_name() {
        let items = vec![
            item(DiffType::FkAdded, "b", Some("fk")),
            item(DiffType::ColumnAdded, "b", Some("z")),
            item(DiffType::ColumnAdded, "a", Some("y")),
            item(DiffType::ColumnAdded, "b", Some("a")),
            item(DiffType::FkRemoved, "c", Some("fk_old")),
        ];
        let plan = plan(items, &ctx(&["a", "b", "c", "parent"], &[]), ";").unwrap();
        let order: Vec<(DiffType, &str, Option<&str>)> = plan
            .items
            .iter()
            .map(|i| (i.diff_type, i.table.name.as_str(), i.name.as_deref()))
            .collect();
        assert_eq!(
            order,
            vec![
                (DiffType::FkRemoved, "c", Some("fk_old")),
                (DiffType::ColumnAdded, "a", Some("y")),
                (DiffType::ColumnAdded, "b", Some("a")),
                (DiffType::ColumnAdded, "b", Some("z")),
                (DiffType::FkAdded, "b", Some("fk")),
            ]
        );
    }

    #[test]
    fn test_table_removed_before_column_changes() {
        let items = vec![
            item(DiffType::ColumnRemoved, "a", Some("x")),
            item(DiffType::TableRemoved, "z", None),
            item(DiffType::ColumnModified, "b", Some("y")),
        ];
        let plan = plan(items, &ctx(&["a", "b", "z"], &[]), ";").unwrap();
        assert_eq!(plan.items[0].diff_type, DiffType::TableRemoved);
        assert_eq!(plan.items[1].table.name, "a");
        assert_eq!(plan.items[2].table.name, "b");
    }

    #[test]
    fn test_script_terminates_each_statement() {
        let mut first = item(DiffType::FkModified, "orders", Some("fk_user"));
        first.migration_sql = vec!["DROP x".into(), "ADD y".into()];
        let mut second = item(DiffType::ColumnAdded, "orders", Some("note"));
        second.migration_sql = vec!["ALTER z".into()];

        let plan = plan(vec![second, first], &ctx(&["orders", "parent"], &[]), ";").unwrap();
        assert_eq!(plan.script, "DROP x;\nADD y;\nALTER z;\n");
    }

    #[test]
    fn test_empty_plan() {
        let plan = plan(Vec::new(), &PlanContext::default(), ";").unwrap();
        assert!(plan.items.is_empty());
        assert!(plan.script.is_empty());
    }

    #[test]
    fn test_new_table_is_live_for_later_items() {
        let items = vec![
            item(DiffType::FkAdded, "child", Some("fk")),
            item(DiffType::TableAdded, "parent", None),
            item(DiffType::TableAdded, "child", None),
            item(DiffType::IndexAdded, "child", Some("idx")),
        ];
        assert!(plan(items, &ctx(&[], &["parent", "child"]), ";").is_ok());
    }

    #[test]
    fn test_reference_to_dropped_table_is_a_violation() {
        let items = vec![
            item(DiffType::TableRemoved, "parent", None),
            item(DiffType::FkAdded, "child", Some("fk")),
        ];
        let err = plan(items, &ctx(&["parent", "child"], &[]), ";").unwrap_err();
        assert!(matches!(
            err,
            DiffError::OrderingViolation { ref item, ref reason }
                if item == "fk_added child (fk)" && reason.contains("referenced table parent")
        ));
    }

    #[test]
    fn test_modified_fk_to_new_table_is_a_violation() {
        let items = vec![
            item(DiffType::TableAdded, "parent", None),
            item(DiffType::FkModified, "child", Some("fk")),
        ];
        let err = plan(items, &ctx(&["child"], &["parent"]), ";").unwrap_err();
        assert!(matches!(err, DiffError::OrderingViolation { .. }));
    }

    #[test]
    fn test_column_on_dropped_table_is_a_violation() {
        let items = vec![
            item(DiffType::TableRemoved, "t", None),
            item(DiffType::ColumnAdded, "t", Some("c")),
        ];
        assert!(matches!(
            plan(items, &ctx(&["t"], &[]), ";"),
            Err(DiffError::OrderingViolation { .. })
        ));
    }

    #[test]
    fn test_unknown_referenced_table_is_assumed_to_exist() {
        let items = vec![item(DiffType::FkAdded, "child", Some("fk"))];
        assert!(plan(items, &ctx(&["child"], &[]), ";").is_ok());
    }

    #[test]
    fn test_modified_index_on_new_column_is_a_violation() {
        let items = vec![
            item(DiffType::ColumnAdded, "users", Some("b")),
            index_on("users", "idx_a", &["c", "b"], DiffType::IndexModified),
        ];
        let err = plan(items, &ctx(&["users"], &[]), ";").unwrap_err();
        assert!(matches!(
            err,
            DiffError::OrderingViolation { ref item, ref reason }
                if item == "index_modified users (idx_a)" && reason.contains("column b of users")
        ));
    }

    #[test]
    fn test_added_index_on_new_column_is_ordered() {
        let items = vec![
            index_on("users", "idx_b", &["b"], DiffType::IndexAdded),
            item(DiffType::ColumnAdded, "users", Some("b")),
        ];
        let plan = plan(items, &ctx(&["users"], &[]), ";").unwrap();
        assert_eq!(plan.items[0].diff_type, DiffType::ColumnAdded);
    }

    #[test]
    fn test_modified_fk_on_new_column_is_a_violation() {
        let items = vec![
            item(DiffType::ColumnAdded, "orders", Some("account_id")),
            fk_on("orders", &["account_id"], &["id"], DiffType::FkModified),
        ];
        let err = plan(items, &ctx(&["orders", "parent"], &[]), ";").unwrap_err();
        assert!(matches!(
            err,
            DiffError::OrderingViolation { ref reason, .. } if reason.contains("column account_id of orders")
        ));
    }

    #[test]
    fn test_fk_to_new_referenced_column_is_a_violation() {
        let items = vec![
            item(DiffType::ColumnAdded, "parent", Some("code")),
            fk_on("child", &["c"], &["code"], DiffType::FkModified),
        ];
        let err = plan(items, &ctx(&["child", "parent"], &[]), ";").unwrap_err();
        assert!(matches!(
            err,
            DiffError::OrderingViolation { ref reason, .. } if reason.contains("column code of parent")
        ));

        // Added constraints run after every new column.
        let items = vec![
            item(DiffType::ColumnAdded, "parent", Some("code")),
            fk_on("child", &["c"], &["code"], DiffType::FkAdded),
        ];
        assert!(plan(items, &ctx(&["child", "parent"], &[]), ";").is_ok());
    }

    #[test]
    fn test_index_on_removed_column_is_a_violation() {
        let mut removed = item(DiffType::ColumnRemoved, "users", Some("c"));
        removed.source = None;
        let items = vec![removed, index_on("users", "idx_c", &["c"], DiffType::IndexAdded)];
        assert!(matches!(
            plan(items, &ctx(&["users"], &[]), ";"),
            Err(DiffError::OrderingViolation { .. })
        ));
    }

    #[test]
    fn test_context_tracks_columns() {
        let users = Table::new("", "users").column(Column::new("id", "bigint"));
        let ctx = PlanContext::new(&[], &[users]);
        assert!(ctx.exists(&key("users")));
        assert!(ctx.has_column(&key("users"), "id"));
        assert!(!ctx.has_column(&key("users"), "email"));
        assert!(!ctx.has_column(&key("orders"), "id"));
    }

    #[test]
    fn test_columns_of_unknown_tables_are_not_checked() {
        let items = vec![fk_on("child", &["c"], &["missing"], DiffType::FkAdded)];
        assert!(plan(items, &ctx(&["child"], &[]), ";").is_ok());
    }
}
