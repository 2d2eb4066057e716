//! Voice Focus CLI Application

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use voicefocus_core::domain::config::{ConfigManager, VoiceFocusConfig};
use voicefocus_core::domain::control::ControlSurface;
use voicefocus_core::domain::graph::GraphBuilder;
use voicefocus_core::domain::media::Document;
use voicefocus_core::domain::message::Command;
use voicefocus_core::domain::signal_path::{plan, ChainOptions, RoutingState};
use voicefocus_infra::audio::RenderGraph;
use voicefocus_infra::coordinator::{CoordinatorHandle, CoordinatorRuntime};
use voicefocus_infra::page::{PageHub, PageRuntime, WatchedDirectory};

#[derive(Parser)]
#[command(name = "voicefocus")]
#[command(about = "Voice-isolating audio chain for hosted media pages", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a page on a watched directory and read JSON commands from stdin
    Run {
        /// Config file (defaults to the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory whose media files play the role of video elements
        #[arg(short, long)]
        watch: Option<PathBuf>,

        /// URL the hosted page reports
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Print the connections realising a routing state
    Plan {
        /// Route the source straight to the output
        #[arg(long, conflicts_with_all = ["deesser", "reverb"])]
        bypass: bool,

        #[arg(long)]
        deesser: bool,

        #[arg(long)]
        reverb: bool,
    },
    /// Write the factory default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        // stdout carries replies
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { config, watch, url } => run(config, watch, url).await,
        Commands::Plan {
            bypass,
            deesser,
            reverb,
        } => {
            let state = RoutingState::target(!bypass, ChainOptions::new(deesser, reverb));
            for connection in plan(state) {
                println!("{connection}");
            }
            Ok(())
        }
        Commands::InitConfig { force } => init_config(force).await,
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<VoiceFocusConfig> {
    match path {
        Some(path) => VoiceFocusConfig::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let manager = ConfigManager::new(ConfigManager::default_config_dir()?);
            Ok(manager.load().await)
        }
    }
}

async fn init_config(force: bool) -> anyhow::Result<()> {
    let manager = ConfigManager::new(ConfigManager::default_config_dir()?);
    if manager.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            manager.config_path().display()
        );
    }

    manager.save(&VoiceFocusConfig::default()).await?;
    println!("{}", manager.config_path().display());
    Ok(())
}

async fn run(
    config_path: Option<PathBuf>,
    watch: Option<PathBuf>,
    url: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref()).await?;

    let root = match watch.or_else(|| config.watch.directory.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let url = url.unwrap_or_else(|| config.site.page_url.clone());

    let hub = PageHub::new();
    let page_id = hub.register(url.as_str());
    let document = WatchedDirectory::open(&root, url, &config.watch.media_extensions)
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    tracing::info!(page = %page_id, url = document.url(), "Hosting page");

    let graph = GraphBuilder::new(RenderGraph::new(config.app.sample_rate), config.chain);
    let (page, page_handle) = PageRuntime::new(
        page_id,
        ControlSurface::new(graph, document),
        config.app.mailbox_capacity,
    );
    let page_task = page.spawn();
    hub.attach(page_handle);

    let (coordinator, client) = CoordinatorRuntime::new(
        hub.clone(),
        config.site.url_pattern.clone(),
        config.features,
        config.app.mailbox_capacity,
    );
    let coordinator_task = coordinator
        .with_ack_timeout(Duration::from_millis(config.app.ack_timeout_ms))
        .spawn();

    tracing::info!("🎙️ Voice Focus ready, reading commands from stdin");
    serve_stdin(&client).await?;

    // Closing every handle lets both loops finish
    drop(client);
    let relay = coordinator_task.await?;
    hub.remove(page_id);
    let surface = page_task.await?;

    tracing::info!(
        state = ?relay.state(),
        connected = surface.graph().is_connected(),
        "Voice Focus stopped"
    );
    Ok(())
}

/// One JSON command per line in, one JSON reply per line out
async fn serve_stdin(client: &CoordinatorHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command: Command = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid command");
                println!("{}", serde_json::json!({ "success": false, "error": e.to_string() }));
                continue;
            }
        };

        let reply = client.send(command).await?;
        println!("{}", serde_json::to_string(&reply)?);
    }

    Ok(())
}
