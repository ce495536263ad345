use std::path::PathBuf;
use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codex::commands::{self, ClearScope};
use codex::config::load_options;
use codex_cache::{parse_ttl, CodexClient, FetchRequest};

#[derive(Parser)]
#[command(name = "codex")]
#[command(about = "Fetch and cache codex:// knowledge documents", long_about = None)]
struct Cli {
    /// Working directory
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    /// Config file (default: nearest .fractary/codex/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Current organization (with --project)
    #[arg(long)]
    org: Option<String>,

    /// Current project (with --org)
    #[arg(long)]
    project: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a document and print its content
    Fetch {
        /// Reference, e.g. codex://org/project/docs/guide.md
        uri: String,

        /// Branch or tag to read from
        #[arg(short, long)]
        branch: Option<String>,

        /// TTL for a newly cached entry (e.g. 30m, 6h, 1d)
        #[arg(long)]
        ttl: Option<String>,

        /// Skip the cache and refetch
        #[arg(long)]
        no_cache: bool,

        /// Print content and metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a document is cached or available
    Exists {
        uri: String,
    },

    /// Show how a reference resolves
    Resolve {
        uri: String,

        #[arg(long)]
        json: bool,
    },

    /// Inspect and maintain the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached entries
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show cache statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Remove cached entries (all by default)
    Clear {
        /// Only entries past their expiry
        #[arg(long, conflicts_with = "pattern")]
        expired: bool,

        /// Only URIs matching a glob, e.g. "codex://acme/*"
        #[arg(short, long)]
        pattern: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let default_filter = if cli.verbose {
        "codex=debug,codex_cache=debug"
    } else {
        "codex=info,codex_cache=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into())
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = create_client(&cli)?;

    match cli.command {
        Commands::Fetch { ref uri, ref branch, ref ttl, no_cache, json } => {
            let ttl = ttl
                .as_deref()
                .map(parse_ttl)
                .transpose()
                .context("Invalid --ttl")?;
            let request = FetchRequest {
                branch: branch.clone(),
                ttl,
                bypass_cache: no_cache,
            };
            commands::fetch(&client, uri, &request, json).await?;
        }

        Commands::Exists { ref uri } => {
            if !commands::exists(&client, uri).await? {
                client.shutdown().await;
                std::process::exit(1);
            }
        }

        Commands::Resolve { ref uri, json } => {
            commands::resolve(&client, uri, json)?;
        }

        Commands::Cache { ref action } => match action {
            CacheAction::List { json } => commands::list(&client, *json).await?,
            CacheAction::Stats { json } => commands::stats(&client, *json).await?,
            CacheAction::Clear { expired, pattern } => {
                let scope = match (expired, pattern) {
                    (true, _) => ClearScope::Expired,
                    (false, Some(pattern)) => ClearScope::Pattern(pattern.clone()),
                    (false, None) => ClearScope::All,
                };
                commands::clear(&client, &scope).await?;
            }
        },
    }

    client.shutdown().await;
    Ok(())
}

fn create_client(cli: &Cli) -> Result<CodexClient> {
    let mut options = load_options(&cli.workdir, cli.config.as_deref())?;

    if let Some(dir) = &cli.cache_dir {
        options.cache_dir = dir.clone();
    }
    if let Some(org) = &cli.org {
        options.org = Some(org.clone());
    }
    if let Some(project) = &cli.project {
        options.project = Some(project.clone());
    }

    CodexClient::new(&options).context("Failed to initialize codex client")
}
