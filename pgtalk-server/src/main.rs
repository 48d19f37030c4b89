use clap::Parser;
use pgtalk_core::{PgTalkConfig, PgVectorStore};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use pgtalk_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pgtalk.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (DB_* and OPENAI_API_KEY usually live there)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match PgTalkConfig::load(&args.config).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match pgtalk_core::db::create_pool(&config.database).await {
        Ok(p) => {
            tracing::info!(database = %config.database.name, "Connected to database successfully");
            p
        }
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match pgtalk_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match pgtalk_core::db::check_pgvector(&pool).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ pgtalk health check passed");
        return Ok(());
    }

    PgVectorStore::new(pool.clone()).ensure_schema().await?;
    let assistant = pgtalk_core::openai_assistant(pool.clone(), &config)?;

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = HttpState {
        pool,
        assistant,
        config,
    };
    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
