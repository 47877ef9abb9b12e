//! `StreamSift` CLI - browse catalogs and resolve playable streams

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use streamsift::{Config, SearchQuery};

#[derive(Parser)]
#[command(name = "streamsift")]
#[command(about = "Resolve catalog entries into ranked, directly playable streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog backend
    #[arg(
        short,
        long,
        value_enum,
        default_value_t = SourceKind::Jellyfin,
        global = true
    )]
    source: SourceKind,

    /// Config file (default: <config dir>/streamsift/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a preference, e.g. `--pref preferredHostLabel=Okru`
    #[arg(long = "pref", value_name = "KEY=VALUE", global = true)]
    prefs: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Jellyfin-style media server
    Jellyfin,
    /// Scraped PelisPlusHD-style site
    Pelisplus,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the host kind of embed URLs or tokens (offline)
    Classify {
        /// Embed URLs, base64 tokens or go_to_player(...) handlers
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Decode embed URLs into ranked playable streams
    Resolve {
        /// Embed URLs or obfuscated tokens
        #[arg(required = true)]
        embeds: Vec<String>,
    },

    /// Browse the catalog listing
    Popular {
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Browse recently added items
    Latest {
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Search by text, or filter by genre or year
    Search {
        /// Search text
        text: Option<String>,

        /// Genre filter
        #[arg(short, long)]
        genre: Option<String>,

        /// Release year filter
        #[arg(short, long)]
        year: Option<u32>,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show an item's metadata
    Detail {
        /// Item id (site path for pelisplus)
        id: String,
    },

    /// List an item's episodes, newest first
    Episodes {
        /// Item id (site path for pelisplus)
        id: String,
    },

    /// Resolve an episode into ranked playable streams
    Videos {
        /// Episode id, as printed by `episodes`
        id: String,
    },

    /// List the media server's libraries
    Libraries,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>, prefs: &[String]) -> Result<Config> {
    let mut config = Config::load(path)?;
    for pref in prefs {
        let (key, value) = pref
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got {pref:?}"))?;
        config.preferences.apply_flat(key.trim(), value.trim())?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Classify { urls } = &cli.command {
        cmd::cmd_classify(urls);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref(), &cli.prefs)?;
    let (source, json) = (cli.source, cli.json);

    match cli.command {
        Commands::Classify { .. } => {}
        Commands::Resolve { embeds } => cmd::cmd_resolve(&config, &embeds, json).await?,
        Commands::Popular { page } => cmd::cmd_popular(source, &config, page, json).await?,
        Commands::Latest { page } => cmd::cmd_latest(source, &config, page, json).await?,
        Commands::Search {
            text,
            genre,
            year,
            page,
        } => {
            let query = SearchQuery {
                text: text.unwrap_or_default(),
                genre,
                year,
            };
            cmd::cmd_search(source, &config, &query, page, json).await?;
        }
        Commands::Detail { id } => cmd::cmd_detail(source, &config, &id, json).await?,
        Commands::Episodes { id } => cmd::cmd_episodes(source, &config, &id, json).await?,
        Commands::Videos { id } => cmd::cmd_videos(source, &config, &id, json).await?,
        Commands::Libraries => cmd::cmd_libraries(&config, json).await?,
    }

    Ok(())
}
