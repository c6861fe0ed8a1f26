//! Example: Blog Schema Diff
//!
//! This example compares two versions of a blog schema (users, posts and
//! comments) and prints the planned migration for every engine.
//!
//! Run with: cargo run --example blog_schema_diff -p oxide-schema-diff

use oxide_schema_diff::prelude::*;

// =============================================================================
// Schema Versions
// =============================================================================

/// What the database looks like today.
fn current() -> Vec<Table> {
    vec![
        Table::new("", "users")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("username", "varchar(100)").not_null())
            .column(Column::new("legacy_token", "text"))
            .index(Index::new("idx_users_username", ["username"])),
        Table::new("", "posts")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("author_id", "bigint").not_null())
            .column(Column::new("title", "varchar(200)").not_null())
            .foreign_key(ForeignKey::new("fk_posts_author", ["author_id"], "users", ["id"])),
        Table::new("", "sessions")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("user_id", "bigint").not_null())
            .foreign_key(ForeignKey::new("fk_sessions_user", ["user_id"], "users", ["id"])),
    ]
}

/// What the application expects.
fn desired() -> Vec<Table> {
    vec![
        Table::new("", "users")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("username", "varchar(100)").not_null())
            .column(
                Column::new("created_at", "timestamp")
                    .not_null()
                    .default_value("CURRENT_TIMESTAMP"),
            )
            .index(Index::new("idx_users_username", ["username"]).unique()),
        Table::new("", "posts")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("author_id", "bigint").not_null())
            .column(Column::new("title", "varchar(200)").not_null())
            .column(Column::new("status", "varchar(20)").not_null().default_value("draft"))
            .foreign_key(ForeignKey::new("fk_posts_author", ["author_id"], "users", ["id"])),
        Table::new("", "comments")
            .column(Column::new("id", "bigint").primary_key())
            .column(Column::new("post_id", "bigint").not_null())
            .column(Column::new("body", "text").not_null())
            .index(Index::new("idx_comments_post", ["post_id"]))
            .foreign_key(ForeignKey::new("fk_comments_post", ["post_id"], "posts", ["id"])),
    ]
}

// =============================================================================
// Main
// =============================================================================

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!(" OXIDE-SCHEMA-DIFF: Blog Schema Example");
    println!("{}", "=".repeat(70));
    println!();

    let current = current();
    let desired = desired();

    for engine in Engine::ALL {
        println!("[{engine}]");
        println!("{}", "-".repeat(70));
        match compare_schemas(&desired, &current, engine) {
            Ok(diff) => {
                println!("    {}\n", diff.summary);
                for item in &diff.items {
                    println!("    - {item}");
                }
                println!("\n{}", diff.script);
            }
            Err(e @ DiffError::UnsupportedOperation { .. }) => {
                println!("    {e}\n");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
