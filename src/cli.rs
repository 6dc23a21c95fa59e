use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use vodmux::types::SourceKind;

/// Search many video catalogs at once
#[derive(Parser)]
#[command(name = "vodmux")]
#[command(about = "Aggregate CMS video APIs and live M3U8 playlists", long_about = None)]
pub struct Cli {
    /// Path to a config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Bypass cached responses
    #[arg(long, global = true)]
    pub refresh: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage registered sources
    Sources {
        #[command(subcommand)]
        action: Option<SourcesCmd>,
    },
    /// Search every usable source
    Search {
        /// Free-text query
        query: String,
    },
    /// List a category from the first usable CMS source
    Browse {
        /// Category name (movies, series, ...) or raw id; omit for the front page
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Check which sources respond
    Probe {
        /// Only probe this source id
        #[arg(long)]
        id: Option<String>,
    },
    /// Response cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheCmd,
    },
    /// Show or change the relay used for outbound requests
    Relay {
        #[command(subcommand)]
        action: Option<RelayCmd>,
    },
}

#[derive(Subcommand)]
pub enum SourcesCmd {
    /// List registered sources
    List,
    /// Register a source by URL
    Add {
        name: String,
        url: String,
        /// Force the source kind instead of inferring it from the URL
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Register one of the curated sources by name
    AddCurated { name: String },
    /// Remove a source by id
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum CacheCmd {
    /// Show how much space cached responses take
    Size,
    /// Drop cached responses, optionally only those for one source URL
    Clear {
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RelayCmd {
    /// Print the relay in effect and the known presets
    Show,
    /// Select a preset (`custom` takes --url)
    Set {
        preset: String,
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Cms,
    Playlist,
}

impl From<KindArg> for SourceKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Cms => SourceKind::CmsApi,
            KindArg::Playlist => SourceKind::Playlist,
        }
    }
}
