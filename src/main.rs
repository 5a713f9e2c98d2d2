use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use kumquat_search::config::Config;
use kumquat_search::search::{
    AccessContext, AccessResolver, EntityType, HostGroupResolver, OrderBy, QueryResult,
    ReindexMode, SearchClient, SearchError, SearchService, SortDirection,
};
use kumquat_search::AppError;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kumquat-search")]
#[command(about = "Kumquat search operator CLI", long_about = None, version)]
struct Cli {
    /// Configuration file (defaults to $KUMQUAT_CONFIG, then config/kumquat.toml)
    #[arg(short, long, env = "KUMQUAT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the engine endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    Item,
    Collection,
    Entity,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search and print its count, identifiers and facets
    Search {
        #[arg(value_enum, default_value = "item")]
        target: Target,

        /// Free-text query across all fields
        #[arg(short, long)]
        query: Option<String>,

        /// `field:value` facet filter, repeatable
        #[arg(short, long = "facet")]
        facets: Vec<String>,

        #[arg(long, default_value = "0")]
        start: usize,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Sort field; prefix with `-` for descending
        #[arg(short, long)]
        order: Option<String>,

        /// Resolve access keys for a request from this host
        #[arg(long)]
        host: Option<String>,

        /// Ignore publication and access restrictions
        #[arg(long)]
        admin: bool,

        /// Print the query document instead of running it
        #[arg(long)]
        json: bool,
    },

    /// Index administration
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Alias administration
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },

    /// Copy all documents of one index into another
    Reindex {
        from: String,
        to: String,

        /// Run as a background task and poll until it completes
        #[arg(long)]
        task: bool,
    },

    /// Document access
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Delete every document of an index
    Purge { index: String },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create an index from a JSON settings/mappings file
    Create {
        name: String,
        #[arg(short, long)]
        mappings: Option<PathBuf>,
    },
    Delete { name: String },
    Exists { name: String },
    Refresh { name: String },
}

#[derive(Subcommand)]
enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

#[derive(Subcommand)]
enum DocumentAction {
    Get { index: String, id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(app) = error.downcast_ref::<AppError>() {
        return app.exit_code();
    }
    match error.downcast_ref::<SearchError>() {
        Some(search) if search.is_io() => 3,
        Some(SearchError::InvalidArgument(_)) => 2,
        _ => 1,
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("kumquat_search={}", config.observability.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path, true)?,
        None => Config::load()?,
    };
    if let Some(endpoint) = cli.endpoint {
        config.engine.endpoint = endpoint;
        config.validate()?;
    }

    init_tracing(&config);
    if config.observability.metrics_enabled {
        if let Err(e) = kumquat_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let client = SearchClient::new(&config.engine)?;

    match cli.command {
        Commands::Search {
            target,
            query,
            facets,
            start,
            limit,
            order,
            host,
            admin,
            json,
        } => {
            let access = if admin {
                AccessContext::administrative()
            } else {
                let resolver = HostGroupResolver::new(&config.host_groups)?;
                AccessContext::for_requester(&resolver as &dyn AccessResolver, host.as_deref(), None)
            };
            let order = order.as_deref().map(parse_order);
            let service = SearchService::from_config(&config)?;

            macro_rules! run_search {
                ($relation:expr) => {{
                    let mut relation = $relation;
                    relation.access_context(access).facet_filters(facets).start(start);
                    if let Some(text) = &query {
                        relation.query_all(text);
                    }
                    if let Some(limit) = limit {
                        relation.limit(limit);
                    }
                    if let Some(order) = order {
                        relation.order(order);
                    }
                    if json {
                        print_json(&relation.to_json())?;
                    } else {
                        print_json(&summarize(relation.load().await?))?;
                    }
                }};
            }

            match target {
                Target::Item => run_search!(service.items()),
                Target::Collection => run_search!(service.collections()),
                Target::Entity => run_search!(service.entities()),
            }
        }

        Commands::Index { action } => match action {
            IndexAction::Create { name, mappings } => {
                let body = match mappings {
                    Some(path) => {
                        let raw = std::fs::read_to_string(&path)
                            .with_context(|| format!("reading {}", path.display()))?;
                        serde_json::from_str(&raw).map_err(AppError::from)?
                    }
                    None => json!({}),
                };
                client.create_index(&name, &body).await?;
                println!("Created index {}", name);
            }
            IndexAction::Delete { name } => {
                client.delete_index(&name).await?;
                println!("Deleted index {}", name);
            }
            IndexAction::Exists { name } => {
                let exists = client.index_exists(&name).await;
                println!("{}", exists);
                if !exists {
                    std::process::exit(1);
                }
            }
            IndexAction::Refresh { name } => {
                client.refresh(&name).await?;
                println!("Refreshed index {}", name);
            }
        },

        Commands::Alias { action } => match action {
            AliasAction::Add { index, alias } => {
                client.create_index_alias(&index, &alias).await?;
                println!("Aliased {} -> {}", alias, index);
            }
            AliasAction::Remove { index, alias } => {
                client.delete_index_alias(&index, &alias).await?;
                println!("Removed alias {} from {}", alias, index);
            }
        },

        Commands::Reindex { from, to, task } => {
            let mode = if task {
                ReindexMode::Task
            } else {
                ReindexMode::Blocking
            };
            let outcome = client.reindex(&from, &to, mode).await?;
            print_json(&serde_json::to_value(&outcome).map_err(AppError::from)?)?;
        }

        Commands::Document { action } => match action {
            DocumentAction::Get { index, id } => match client.get_document(&index, &id).await? {
                Some(doc) => print_json(&doc)?,
                None => {
                    eprintln!("Document {} not found in {}", id, index);
                    std::process::exit(1);
                }
            },
        },

        Commands::Purge { index } => {
            let deleted = client.purge(&index).await?;
            println!("Deleted {} documents from {}", deleted, index);
        }
    }

    Ok(())
}

fn parse_order(raw: &str) -> OrderBy {
    match raw.strip_prefix('-') {
        Some(field) => OrderBy::from((field, SortDirection::Desc)),
        None => OrderBy::from(raw),
    }
}

fn summarize(result: &QueryResult) -> Value {
    json!({
        "total_count": result.total_count,
        "ids": result.ids(),
        "unidentified": result.unidentified,
        "facets": result.facets,
        "total_byte_size": result.total_byte_size,
        "types": result
            .hits
            .iter()
            .map(|hit| hit.entity_type.map(|t: EntityType| t.to_string()))
            .collect::<Vec<_>>(),
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
