// Soundboard - fade-in/fade-out clip player with a static file server
// Module declarations
pub mod audio;
pub mod board;
pub mod clip;
pub mod commands;
pub mod console;
pub mod error;
pub mod library;
pub mod logging;
pub mod playback;
pub mod server;
pub mod settings;
pub mod state;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use audio::{AudioEngine, CpalEngine, HeadlessEngine};
use board::Soundboard;
use library::catalog::{ClipCatalogProvider, RemoteListing, StaticList};
use settings::AppSettings;
use state::AppState;

#[derive(Debug, Parser)]
#[command(name = "soundboard", version, about = "Soundboard with fade transitions")]
pub struct Cli {
    /// Verbose logging and request logging
    #[arg(
        long,
        global = true,
        env = "SOUNDBOARD_DEBUG",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the page, the sound files and the listing endpoint
    Serve(ServeArgs),
    /// Run the soundboard in this terminal
    Play(PlayArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, default_value = "sounds")]
    pub sounds: PathBuf,

    #[arg(long, default_value = "public")]
    pub public: PathBuf,

    #[arg(long, default_value = "soundboard.json")]
    pub settings: PathBuf,

    /// Only serve files; don't play sounds on this machine
    #[arg(long)]
    pub no_playback: bool,

    /// Play without an audio device
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Load clips from a running soundboard server
    #[arg(long, conflicts_with_all = ["sounds", "builtin"])]
    pub server: Option<String>,

    /// Load every sound file in this directory
    #[arg(long)]
    pub sounds: Option<PathBuf>,

    /// Use the built-in clip list (files are read from --sounds, default ./sounds)
    #[arg(long)]
    pub builtin: bool,

    #[arg(long, default_value = "soundboard.json")]
    pub settings: PathBuf,

    #[arg(long)]
    pub headless: bool,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command {
        Command::Serve(args) => runtime.block_on(serve(args, cli.debug)),
        Command::Play(args) => runtime.block_on(play(args)),
    }
}

fn open_engine(headless: bool) -> error::Result<Arc<dyn AudioEngine>> {
    if headless {
        return Ok(Arc::new(HeadlessEngine::default()));
    }
    let engine = CpalEngine::new()?;
    Ok(Arc::new(engine))
}

async fn serve(args: ServeArgs, debug: bool) -> anyhow::Result<()> {
    let settings = AppSettings::load(&args.settings)?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("Failed to bind port {}", args.port))?;

    let board = if args.no_playback {
        None
    } else {
        let board = Soundboard::new();
        // The host session loads through the listing endpoint, like the page does
        let base = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
        let provider = RemoteListing::new(&base)?;
        let engine = open_engine(args.headless);
        let session = board.clone();
        tokio::spawn(async move {
            session.initialize(engine, &provider, &settings).await;
        });
        Some(board)
    };

    let state = AppState::new(args.sounds, args.public, board.clone());
    server::run_server(listener, state, debug, shutdown_signal()).await?;

    if let Some(board) = board {
        board.shutdown().await;
    }
    Ok(())
}

async fn play(args: PlayArgs) -> anyhow::Result<()> {
    let settings = AppSettings::load(&args.settings)?;
    let sounds = args.sounds.clone().unwrap_or_else(|| PathBuf::from("sounds"));

    let provider: Box<dyn ClipCatalogProvider> = match (&args.server, args.builtin) {
        (Some(server), _) => Box::new(RemoteListing::new(server)?),
        (None, true) => Box::new(StaticList::builtin(sounds)),
        (None, false) => Box::new(StaticList::from_dir(sounds)?),
    };
    tracing::info!("Loading clips from {}", provider.describe());

    let board = Soundboard::new();
    board
        .initialize(open_engine(args.headless), provider.as_ref(), &settings)
        .await;

    console::run_console(board).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["soundboard", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else { panic!("expected serve") };
        assert_eq!(args.sounds, PathBuf::from("sounds"));
        assert_eq!(args.public, PathBuf::from("public"));
        assert!(!args.no_playback);
    }

    #[test]
    fn test_play_sources_conflict() {
        assert!(Cli::try_parse_from(["soundboard", "play", "--server", "http://x", "--builtin"]).is_err());
        let cli = Cli::try_parse_from(["soundboard", "play", "--builtin", "--sounds", "clips", "--debug"]).unwrap();
        assert!(cli.debug);
        let Command::Play(args) = cli.command else { panic!("expected play") };
        assert!(args.builtin);
        assert_eq!(args.sounds, Some(PathBuf::from("clips")));
    }
}
