mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::query::{Assignment, FilterArg};
use elastorm::{Connection, ModelMeta, Settings};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "elastorm")]
#[command(about = "elastorm CLI - Elasticsearch index administration and ORM-style lookups")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = "elastorm.toml", env = "ELASTORM_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ModelArg {
    /// Model description (TOML)
    #[arg(short, long)]
    model: PathBuf,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Filter as column__lookup=value (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<FilterArg>,

    /// Negated filter as column__lookup=value (repeatable)
    #[arg(short, long = "exclude")]
    excludes: Vec<FilterArg>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database index
    CreateIndex,

    /// Drop the database index
    DropIndex,

    /// Put the mapping for a model
    Sync {
        #[command(flatten)]
        model: ModelArg,
    },

    /// Drop a model's document type and all its documents
    Flush {
        #[command(flatten)]
        model: ModelArg,
    },

    /// Count matching documents
    Count {
        #[command(flatten)]
        model: ModelArg,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print matching documents as JSON lines
    Search {
        #[command(flatten)]
        model: ModelArg,

        #[command(flatten)]
        filters: FilterArgs,

        /// Ordering, `-field` for descending (repeatable)
        #[arg(short, long = "order", allow_hyphen_values = true)]
        order: Vec<String>,

        /// First row of the returned window
        #[arg(long, default_value = "0")]
        low: usize,

        /// Row after the last one returned
        #[arg(long)]
        high: Option<usize>,
    },

    /// Insert a document
    Insert {
        #[command(flatten)]
        model: ModelArg,

        /// Column value as column=value (repeatable)
        #[arg(short, long = "set", required = true)]
        values: Vec<Assignment>,
    },
}

fn load_model(arg: &ModelArg) -> Result<ModelMeta> {
    ModelMeta::load_from(&arg.model)
        .with_context(|| format!("loading model {}", arg.model.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default(&cli.config)
        .with_context(|| format!("loading settings {}", cli.config.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| settings.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("connecting to {}:{}", settings.database.host, settings.database.port);
    let conn = Connection::connect(settings).await?;

    match cli.command {
        Commands::CreateIndex => commands::run_create_index(&conn).await?,
        Commands::DropIndex => commands::run_drop_index(&conn).await?,
        Commands::Sync { model } => commands::run_sync(&conn, &load_model(&model)?).await?,
        Commands::Flush { model } => commands::run_flush(&conn, &load_model(&model)?).await?,
        Commands::Count { model, filters } => {
            let model = load_model(&model)?;
            commands::run_count(&conn, &model, &filters.filters, &filters.excludes).await?
        }
        Commands::Search {
            model,
            filters,
            order,
            low,
            high,
        } => {
            let model = load_model(&model)?;
            commands::run_search(
                &conn,
                &model,
                &filters.filters,
                &filters.excludes,
                &order,
                low,
                high,
            )
            .await?
        }
        Commands::Insert { model, values } => {
            let model = load_model(&model)?;
            commands::run_insert(&conn, &model, &values).await?
        }
    }

    Ok(())
}
