//! pgtalk-train: teach the assistant about a PostgreSQL database
//!
//! Reads the catalog of the configured database, renders each table as
//! `CREATE TABLE` DDL and stores it (with embeddings) in the training store.
//! Example queries from a `.sql` file are paired with a model-generated
//! business question and stored as well.
//!
//! # Flags
//! - `--skip-train`      — only print the schema (and the queries that would be used)
//! - `--skip-sql-train`  — do not train on example queries
//! - `--sql-file <path>` — example queries, default `queries.sql`

use clap::Parser;
use pgtalk_core::{db, schema, sqlfile, PgTalkConfig, PgVectorStore, SqlAssistant};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "pgtalk-train",
    version,
    about = "Train the pgtalk assistant on database schema and SQL queries"
)]
struct Args {
    /// Optional TOML config with model and retrieval settings
    #[arg(short, long, default_value = "pgtalk.toml")]
    config: String,

    /// Skip training and only print DDL
    #[arg(long)]
    skip_train: bool,

    /// Skip training on SQL queries
    #[arg(long)]
    skip_sql_train: bool,

    /// Path to SQL file with queries for training
    #[arg(long, default_value = "queries.sql")]
    sql_file: String,

    /// Schema to introspect (overrides the config file)
    #[arg(long)]
    schema: Option<String>,
}

// ============================================================================
// Output helpers
// ============================================================================

/// First `n` characters of `s`, for progress lines.
fn head(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Outcome of reading the example-query file.
#[derive(Debug, PartialEq)]
enum QueryFile {
    Missing,
    Empty,
    Queries(Vec<String>),
}

fn read_query_file(path: &str) -> anyhow::Result<QueryFile> {
    Ok(match sqlfile::load_sql_queries(path)? {
        None => QueryFile::Missing,
        Some(q) if q.is_empty() => QueryFile::Empty,
        Some(q) => QueryFile::Queries(q),
    })
}

/// Text printed by `--skip-train`.
fn render_preview(ddl: &[String], queries: Option<&QueryFile>, sql_file: &str) -> String {
    let mut out = String::from("\nDatabase schema:\n\n");
    for statement in ddl {
        out.push_str(statement);
        out.push_str("\n\n");
    }

    if let Some(queries) = queries {
        out.push_str("\nSQL queries for training:\n\n");
        match queries {
            QueryFile::Missing => out.push_str(&format!(
                "INFO: Queries file '{sql_file}' was not found. Skipping SQL training step.\n"
            )),
            QueryFile::Empty => out.push_str(&format!(
                "INFO: No valid SQL queries found in '{sql_file}'.\n"
            )),
            QueryFile::Queries(list) => {
                for (i, query) in list.iter().enumerate() {
                    out.push_str(&format!("Query {}:\n{}\n\n", i + 1, query));
                }
            }
        }
    }
    out
}

// ============================================================================
// Training steps
// ============================================================================

#[derive(Debug, Default, PartialEq)]
struct SqlTrainingReport {
    trained: usize,
    failed: usize,
}

async fn train_schema(assistant: &SqlAssistant, ddl: &[String]) -> anyhow::Result<()> {
    println!("\nTraining on database schema...");
    for statement in ddl {
        println!("Adding DDL: {}...", head(statement, 60));
        assistant.train_ddl(statement).await?;
    }
    tracing::info!(tables = ddl.len(), "Schema training complete");
    Ok(())
}

/// Train on each query; one failing query is reported and skipped.
async fn train_queries(assistant: &SqlAssistant, queries: &[String]) -> SqlTrainingReport {
    let mut report = SqlTrainingReport::default();
    for (i, query) in queries.iter().enumerate() {
        let n = i + 1;
        let result = async {
            let question = assistant.generate_question(query).await?;
            println!("Training on Query {}: {}...", n, head(&question, 60));
            assistant.train_sql(&question, query).await
        }
        .await;

        match result {
            Ok(_) => report.trained += 1,
            Err(e) => {
                println!("Error training on query {}: {}", n, e);
                tracing::warn!(query = n, error = %e, "Skipping example query");
                report.failed += 1;
            }
        }
    }
    report
}

// ============================================================================
// Main
// ============================================================================

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = PgTalkConfig::load(&args.config)?;
    if let Some(schema) = args.schema.clone() {
        config.database.schema = schema;
    }

    // The preview never talks to the model, so it does not need an API key.
    if args.skip_train {
        config.validate_database()?;
    } else {
        config.validate()?;
    }

    let pool = db::create_pool(&config.database).await?;
    println!("Successfully connected to database: {}", config.database.name);

    let ddl = schema::all_ddl(&pool, &config.database.schema).await?;

    if args.skip_train {
        let queries = if args.skip_sql_train {
            None
        } else {
            Some(read_query_file(&args.sql_file)?)
        };
        print!("{}", render_preview(&ddl, queries.as_ref(), &args.sql_file));
        return Ok(());
    }

    PgVectorStore::new(pool.clone()).ensure_schema().await?;
    let assistant = pgtalk_core::openai_assistant(pool, &config)?;

    train_schema(&assistant, &ddl).await?;

    if !args.skip_sql_train {
        println!("\nTraining on SQL queries...");
        match read_query_file(&args.sql_file)? {
            QueryFile::Missing => println!(
                "INFO: Queries file '{}' was not found. Skipping SQL training step.",
                args.sql_file
            ),
            QueryFile::Empty => println!(
                "INFO: No valid SQL queries found in '{}'. Skipping SQL training step.",
                args.sql_file
            ),
            QueryFile::Queries(queries) => {
                let report = train_queries(&assistant, &queries).await;
                tracing::info!(
                    trained = report.trained,
                    failed = report.failed,
                    "SQL training complete"
                );
            }
        }
    }

    println!("\nSuccessfully trained on database schema and SQL queries!");
    println!("You can now use pgtalk-server to query your database in natural language.");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
