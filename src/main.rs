mod cli;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cli::{CacheCmd, Cli, Commands, RelayCmd, SourcesCmd};
use vodmux::aggregator::group_by_source_name;
use vodmux::config::Config;
use vodmux::types::{Source, Video};
use vodmux::Vodmux;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vodmux=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let app = Vodmux::open(config).await?;

    match cli.command {
        Commands::Sources { action } => match action.unwrap_or(SourcesCmd::List) {
            SourcesCmd::List => {
                let sources = app.sources().await;
                if cli.json {
                    print_json(&sources)?;
                } else {
                    print_sources(&sources);
                }
            }
            SourcesCmd::Add { name, url, kind } => {
                let added = match kind {
                    Some(k) => app.add_source_with_kind(&name, &url, k.into()).await?,
                    None => app.add_source(&name, &url).await?,
                };
                println!("Added {} [{}] id={}", added.name, added.kind.as_str(), added.id);
            }
            SourcesCmd::AddCurated { name } => {
                let added = app.add_curated(&name).await?;
                println!("Added {} [{}] id={}", added.name, added.kind.as_str(), added.id);
            }
            SourcesCmd::Remove { id } => {
                let removed = app.remove_source(&id, &mut Vec::new()).await?;
                println!("Removed {}", removed.name);
            }
        },
        Commands::Search { query } => {
            let outcome = app.search(&query, cli.refresh).await?;
            if cli.json {
                print_json(&outcome.videos)?;
            } else {
                print_videos(&outcome.videos);
            }
            if let Some(summary) = outcome.error_summary() {
                eprintln!("{summary}");
            }
        }
        Commands::Browse { category } => {
            let id = category.as_deref().and_then(|c| app.config().categories.resolve(c));
            let videos = app.browse_category(id.as_deref(), cli.refresh).await?;
            if cli.json {
                print_json(&videos)?;
            } else {
                print_videos(&videos);
            }
        }
        Commands::Probe { id } => {
            match id {
                Some(id) => {
                    app.probe_source(&id).await?;
                }
                None => {
                    app.probe_all().await;
                }
            }
            let sources = app.sources().await;
            if cli.json {
                print_json(&sources)?;
            } else {
                print_sources(&sources);
            }
        }
        Commands::Cache { action: CacheCmd::Size } => {
            let bytes = app.cache_size().await;
            if cli.json {
                print_json(&serde_json::json!({ "bytes": bytes }))?;
            } else {
                println!("Cache size: {}", human_size(bytes));
            }
        }
        Commands::Cache { action: CacheCmd::Clear { url } } => {
            let removed = app.clear_cache(url.as_deref()).await;
            println!("Removed {removed} cached responses");
        }
        Commands::Relay { action } => match action.unwrap_or(RelayCmd::Show) {
            RelayCmd::Show => {
                let relay = app.relay().await;
                let shown = if relay.prefix().is_empty() { "(direct)" } else { relay.prefix() };
                println!("Current relay: {shown}");
                for p in &app.config().relay.presets {
                    println!("  {:<14} {}", p.id, p.name);
                }
            }
            RelayCmd::Set { preset, url } => {
                let relay = app.set_relay(&preset, url.as_deref()).await?;
                println!("Relay is now {:?} {}", relay.style(), relay.prefix());
            }
        },
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn human_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    if kb > 1024.0 { format!("{:.2} MB", kb / 1024.0) } else { format!("{kb:.2} KB") }
}

fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        println!("No sources registered.");
        return;
    }
    for s in sources {
        let latency = s.latency_ms.map(|ms| format!(" {ms} ms")).unwrap_or_default();
        println!("{:<12} {:<9} {}{}  {}\n    id={}", s.status.as_str(), s.kind.as_str(), s.name, latency, s.url, s.id);
    }
}

fn print_videos(videos: &[Video]) {
    if videos.is_empty() {
        println!("No results.");
        return;
    }
    for (source, group) in group_by_source_name(videos) {
        println!("== {source} ({})", group.len());
        for v in group {
            let remarks = if v.remarks.is_empty() { String::new() } else { format!(" [{}]", v.remarks) };
            println!("  {}{}  ({} episodes)", v.title, remarks, v.episodes.len());
        }
    }
}
