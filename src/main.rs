//! Engine runner (default binary).
//!
//! Launches a UCI or XBoard engine, negotiates the protocol, and then either
//! lists what the engine declared or searches a single position.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use engine_link::adapter::{launch, EngineConfig, EngineHandle};
use engine_link::core::{
    CustomSetting, EngineSettings, GameSetup, OptionKind, PeerNotification, TimeControl,
};
use engine_link::protocol::ProtocolKind;
use engine_link::types::{GameResult, Score, Side};

#[derive(Parser)]
#[command(name = "engine-link")]
#[command(about = "Drive a UCI or XBoard chess engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON engine configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Engine binary
    #[arg(short, long, global = true)]
    engine: Option<String>,

    /// Argument passed to the engine (repeatable)
    #[arg(long = "arg", global = true)]
    engine_args: Vec<String>,

    /// Wire protocol: uci or xboard
    #[arg(short, long, global = true)]
    protocol: Option<ProtocolKind>,

    /// Display name for the engine
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Append every wire line to this file
    #[arg(long, global = true)]
    log_path: Option<String>,

    /// Engine option as NAME=VALUE (repeatable)
    #[arg(short = 'o', long = "option", global = true)]
    options: Vec<String>,

    /// Seconds to wait for the engine to become ready
    #[arg(long, global = true, default_value = "10")]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the engine's name, options and variants
    Info,

    /// Search one position and print the engine's move
    Go {
        /// Starting position; the variant's initial position if omitted
        #[arg(long)]
        fen: Option<String>,

        /// Variant to play
        #[arg(long, default_value = GameSetup::STANDARD_VARIANT)]
        variant: String,

        /// Time per move in milliseconds
        #[arg(long, default_value = "1000")]
        movetime: u64,

        /// Moves already played from the starting position
        moves: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;
    let ready_timeout = Duration::from_secs(cli.timeout);

    let (handle, mut events, task) = launch(&config)?;
    handle.start();
    handle.apply_settings(config.settings.clone());
    wait_ready(&handle, &mut events, ready_timeout).await?;

    let result = match cli.command.unwrap_or(Commands::Info) {
        Commands::Info => print_info(&handle, config.protocol).await,
        Commands::Go {
            fen,
            variant,
            movetime,
            moves,
        } => {
            let setup = game_setup(fen, variant, &moves)?;
            search(&handle, &mut events, setup, moves, movetime, ready_timeout).await
        }
    };

    handle.quit();
    let _ = task.await;
    result
}

fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env();

    if let Some(engine) = &cli.engine {
        config.command = engine.clone();
    }
    if !cli.engine_args.is_empty() {
        config.args = cli.engine_args.clone();
    }
    if let Some(protocol) = cli.protocol {
        config.protocol = protocol;
    }
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if let Some(path) = &cli.log_path {
        config.log_path = Some(path.clone());
    }
    for option in &cli.options {
        let (name, value) = option
            .split_once('=')
            .with_context(|| format!("option {:?} is not NAME=VALUE", option))?;
        config
            .settings
            .custom_settings
            .push(CustomSetting::new(name.trim(), value.trim()));
    }

    if config.command.is_empty() {
        bail!("no engine given; use --engine, ENGINE_LINK_CMD or a config file");
    }
    if config.name.is_empty() {
        config.name = config.display_name();
    }
    Ok(config)
}

fn game_setup(fen: Option<String>, variant: String, moves: &[String]) -> Result<GameSetup> {
    let start_side = match &fen {
        Some(fen) => {
            let field = fen.split_whitespace().nth(1).unwrap_or("w");
            Side::from_str(field).with_context(|| format!("bad side to move in FEN: {}", field))?
        }
        None => Side::White,
    };
    let side = if moves.len() % 2 == 0 {
        start_side
    } else {
        start_side.opposite()
    };

    let mut setup = GameSetup::new(side).with_variant(variant);
    if let Some(fen) = fen {
        setup = setup.with_fen(fen);
    }
    Ok(setup)
}

/// Wait until the engine reports readiness, failing if it goes away.
async fn wait_ready(
    handle: &EngineHandle,
    events: &mut UnboundedReceiver<PeerNotification>,
    limit: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let notification = tokio::time::timeout_at(deadline, events.recv())
            .await
            .context("engine did not become ready in time")?;
        match notification {
            Some(PeerNotification::Ready) => {
                if handle.is_ready().await {
                    return Ok(());
                }
            }
            Some(PeerNotification::Forfeit(cause)) => bail!("engine lost: {}", cause),
            Some(PeerNotification::Disconnected) | None => bail!("engine disconnected"),
            Some(PeerNotification::Error(text)) => tracing::warn!("engine error: {}", text),
            Some(_) => {}
        }
    }
}

async fn print_info(handle: &EngineHandle, protocol: ProtocolKind) -> Result<()> {
    let name = handle.name().await.unwrap_or_default();
    println!("name: {}", name);
    println!("protocol: {}", protocol);

    println!("options:");
    for option in handle.options().await {
        let domain = match &option.kind {
            OptionKind::Spin { min, max, .. } => format!(" [{}, {}]", min, max),
            OptionKind::Combo { choices, .. } => format!(" {{{}}}", choices.join(", ")),
            _ => String::new(),
        };
        println!(
            "  {} ({}) = {}{}",
            option.name,
            option.kind.as_str(),
            option.value,
            domain
        );
    }

    let variants = handle.variants().await;
    if !variants.is_empty() {
        println!("variants: {}", variants.join(", "));
    }
    Ok(())
}

async fn search(
    handle: &EngineHandle,
    events: &mut UnboundedReceiver<PeerNotification>,
    setup: GameSetup,
    moves: Vec<String>,
    movetime: u64,
    ready_timeout: Duration,
) -> Result<()> {
    if !handle.supports_variant(setup.variant.clone()).await {
        bail!("engine does not support variant {}", setup.variant);
    }

    handle.apply_settings(EngineSettings {
        time_control: Some(TimeControl::fixed_move_time(movetime)),
        ..EngineSettings::default()
    });
    handle.new_game(setup);
    for mv in moves {
        handle.make_move(mv);
    }
    handle.go();

    let limit = Duration::from_millis(movetime) + ready_timeout;
    let deadline = tokio::time::Instant::now() + limit;
    let mut last_eval: Option<Score> = None;
    let best = loop {
        let notification = tokio::time::timeout_at(deadline, events.recv())
            .await
            .context("engine did not move in time")?;
        match notification {
            Some(PeerNotification::Move(mv)) => break mv,
            Some(PeerNotification::Eval(score)) => last_eval = Some(score),
            Some(PeerNotification::Info(text)) => tracing::debug!("{}", text),
            Some(PeerNotification::Error(text)) => tracing::warn!("engine error: {}", text),
            Some(PeerNotification::Forfeit(cause)) => bail!("engine lost: {}", cause),
            Some(PeerNotification::Disconnected) | None => bail!("engine disconnected"),
            Some(_) => {}
        }
    };

    match last_eval {
        Some(score) => println!("bestmove {} ({})", best, score),
        None => println!("bestmove {}", best),
    }

    handle.end_game(GameResult::NoResult);
    wait_ready(handle, events, ready_timeout).await
}
