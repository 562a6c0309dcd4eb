use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use modsearch::config::{self, Config, DeploymentMode};
use modsearch::exclusion::{self, ExclusionRegistry, ExclusionStore, ProxyRemoved, seed};
use modsearch::fetch::handler::FetchOutcome;
use modsearch::fetch::{FetchHandler, ProxyClient};
use modsearch::logging::{self, LogFormat};
use modsearch::queue::{self, FetchTask};
use modsearch::store::Store;

#[derive(Parser)]
#[command(name = "modsearch")]
#[command(version, about = "Module ingestion queue and ranked package search")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (defaults to the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    mode: Option<DeploymentMode>,

    /// Number of local fetch workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[arg(long, global = true)]
    proxy_url: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t)]
    log_format: LogFormat,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert the built-in excluded prefixes
    Seed,
    /// Exclude a module-path prefix from fetching
    Exclude {
        prefix: String,
        #[arg(long)]
        reason: String,
    },
    /// List excluded prefixes
    Exclusions,
    /// Queue module versions given as module@version
    Enqueue {
        #[arg(required = true)]
        versions: Vec<String>,
    },
    /// Fetch and index one module version (task service callback)
    Fetch { module_path: String, version: String },
    /// Search indexed packages
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(db) = &self.db {
            config.db_path = Some(db.clone());
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(proxy_url) = &self.proxy_url {
            config.proxy_url = proxy_url.clone();
        }
        Ok(config)
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<Store>> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {:?}", parent))?;
    }
    Ok(Arc::new(Store::open(&db_path)?))
}

/// Seeds the built-in exclusions, then wires the proxy client to the store
fn fetch_handler(config: &Config, store: Arc<Store>) -> anyhow::Result<FetchHandler> {
    exclusion::populate_excluded(&*store, &seed::submitter())?;
    let proxy_removed = match &config.proxy_removed_path {
        Some(path) => ProxyRemoved::load(path)?,
        None => ProxyRemoved::default(),
    };
    let exclusions = ExclusionRegistry::new(store.clone(), Arc::new(proxy_removed));
    let source = ProxyClient::new(&config.proxy_url)?;

    Ok(FetchHandler::new(
        Arc::new(source),
        store,
        Arc::new(exclusions),
        config.timeout(),
    ))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    let store = open_store(&config)?;

    match cli.command {
        Command::Seed => {
            let inserted = exclusion::populate_excluded(&*store, &seed::submitter())?;
            println!(
                "Inserted {} of {} built-in excluded prefixes",
                inserted,
                exclusion::EXCLUDED_PREFIXES.len()
            );
        }
        Command::Exclude { prefix, reason } => {
            store.insert_excluded_prefix(&prefix, &seed::submitter(), &reason)?;
            info!("Excluded prefix {}", prefix);
        }
        Command::Exclusions => {
            for excluded in store.excluded_prefixes()? {
                println!(
                    "{}\t{}\t{}\t{}",
                    excluded.prefix,
                    excluded.created_by,
                    excluded.created_at.to_rfc3339(),
                    excluded.reason
                );
            }
        }
        Command::Enqueue { versions } => {
            let tasks = versions
                .iter()
                .map(|spec| {
                    FetchTask::parse(spec)
                        .with_context(|| format!("expected module@version, got {:?}", spec))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let handler = fetch_handler(&config, store)?;
            let fetch_queue = queue::new_queue(config.mode, &config, handler)?;
            for task in &tasks {
                fetch_queue.enqueue(&task.module_path, &task.version).await?;
            }
            fetch_queue.close().await;
            info!("Enqueued {} module versions", tasks.len());
        }
        Command::Fetch {
            module_path,
            version,
        } => {
            let handler = fetch_handler(&config, store)?;
            match handler.handle(&module_path, &version).await? {
                FetchOutcome::Excluded => println!("{}@{} is excluded", module_path, version),
                FetchOutcome::Indexed { packages } => {
                    println!("Indexed {}@{} ({} packages)", module_path, version, packages)
                }
            }
        }
        Command::Search {
            terms,
            limit,
            offset,
            json,
        } => {
            let results = store.search(&terms, limit, offset)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            if results.is_empty() {
                println!("No results");
                return Ok(());
            }
            for result in &results {
                println!(
                    "{:.4}\t{}\t{}\t{}",
                    result.rank, result.package.path, result.package.version, result.package.synopsis
                );
            }
            println!("({} total)", results[0].num_results);
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_file = cli.log_file.clone().or_else(|| {
        // Managed callbacks also log to the data directory
        (cli.mode == Some(DeploymentMode::Managed)).then(config::log_path)
    });
    let _guard = logging::init(cli.log_format, log_file.as_deref())?;

    if cli.workers == Some(0) {
        bail!("--workers must be at least 1");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
