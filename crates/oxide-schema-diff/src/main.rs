//! oxide-schema-diff CLI
//!
//! Compares two JSON schema snapshots and prints the differences or the
//! migration script that applies them.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use oxide_schema_diff::prelude::*;

/// Schema diffing and migration planning for SQL databases.
#[derive(Parser)]
#[command(name = "oxide-schema-diff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine to generate SQL for (defaults to the source snapshot's engine, else postgres).
    #[arg(short, long, global = true, env = "SCHEMA_DIFF_ENGINE")]
    engine: Option<Engine>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The two snapshots being compared.
#[derive(Args)]
struct Inputs {
    /// Snapshot of the desired schema.
    #[arg(short, long)]
    source: PathBuf,

    /// Snapshot of the current schema.
    #[arg(short, long)]
    target: PathBuf,

    /// Only compare tables in this schema (all if not specified).
    #[arg(long)]
    schema: Option<String>,

    /// Treat the engine's type aliases as equal (e.g. int4 and integer).
    #[arg(long)]
    normalize_types: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what differs between two snapshots.
    Diff {
        #[command(flatten)]
        inputs: Inputs,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the migration script that turns the target into the source.
    Sql {
        #[command(flatten)]
        inputs: Inputs,

        /// Write the script to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for output.
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Diff { inputs, json } => {
            let diff = run(cli.engine, &inputs)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else {
                println!("{} ({})", diff.summary, diff.engine);
                for item in &diff.items {
                    if item.implied_by_table {
                        println!("  {item} [implied]");
                    } else {
                        println!("  {item}");
                    }
                }
            }
        }

        Commands::Sql { inputs, output } => {
            let diff = run(cli.engine, &inputs)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &diff.script)?;
                    info!(
                        "Wrote {} statements to {}",
                        diff.statements().count(),
                        path.display()
                    );
                }
                None => print!("{}", diff.script),
            }
        }
    }

    Ok(())
}

/// Loads both snapshots and compares them.
fn run(engine: Option<Engine>, inputs: &Inputs) -> anyhow::Result<SchemaDiff> {
    let source = SchemaSnapshot::load(&inputs.source)?;
    let target = SchemaSnapshot::load(&inputs.target)?;

    let engine = engine.or(source.engine).unwrap_or(Engine::Postgres);
    if let Some(target_engine) = target.engine {
        if target_engine != engine {
            warn!(%target_engine, %engine, "target snapshot was taken from a different engine");
        }
    }

    let mut comparer = SchemaComparer::new(engine);
    if inputs.normalize_types {
        match engine {
            Engine::Postgres => comparer = comparer.with_normalizer(PostgresTypeAliases),
            _ => warn!(%engine, "no type aliases known for this engine; comparing types exactly"),
        }
    }

    let source_tables = tables(&source, &inputs.source, inputs.schema.as_deref())?;
    let target_tables = tables(&target, &inputs.target, inputs.schema.as_deref())?;
    info!(
        source = source_tables.len(),
        target = target_tables.len(),
        "Comparing tables"
    );

    Ok(comparer.compare(&source_tables, &target_tables)?)
}

fn tables(snapshot: &SchemaSnapshot, path: &Path, schema: Option<&str>) -> anyhow::Result<Vec<Table>> {
    let Some(schema) = schema else {
        return Ok(snapshot.tables.clone());
    };
    let tables = collect_tables(snapshot, schema)?;
    if tables.is_empty() {
        warn!(schema, path = %path.display(), "no tables in schema");
    }
    Ok(tables)
}
