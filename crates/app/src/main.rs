mod console;

use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use light_control_core::{
    connect_bridge, open_source, AppConfig, Bridge, FadeEffect, PeriodicRamp, ShutdownSignal,
    SimulatedBridge, SourceChooser, SyntheticSource, VideoDebugSession, VideoSource,
};
use tracing_subscriber::EnvFilter;

use crate::console::{parse_choice, Console, MenuChoice, PresetChoice};

fn main() -> light_control_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let signal = ShutdownSignal::global();
    signal.install_interrupt_handler()?;

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => run_menu(&config, signal),
        Commands::Hue { cycles } => run_hue(&config, signal, &mut Console::stdin(), cycles),
        Commands::Video { source } => match source {
            Some(index) => run_video(&config, signal, &mut PresetChoice(index)),
            None => run_video(&config, signal, &mut Console::stdin()),
        },
    }
}

fn run_menu(config: &AppConfig, signal: &ShutdownSignal) -> light_control_core::Result<()> {
    let mut console = Console::stdin();

    loop {
        console.show_menu()?;
        let Some(line) = console.prompt("\nEnter your choice: ")? else {
            break;
        };

        let choice = match parse_choice(&line) {
            Ok(choice) => choice,
            Err(err) => {
                console.say(err.message())?;
                continue;
            }
        };

        let outcome = match choice {
            MenuChoice::HueDebug => {
                tracing::info!("starting hue debug mode");
                run_hue(config, signal, &mut console, None)
            }
            MenuChoice::VideoDebug => {
                tracing::info!("starting video debug mode");
                run_video(config, signal, &mut console)
            }
            MenuChoice::Exit => {
                console.say("\nExiting application...")?;
                break;
            }
        };

        if let Err(err) = outcome {
            tracing::error!(%err, "debug mode failed");
            console.pause("Press Enter to continue...")?;
        } else if !signal.is_shutdown_requested() {
            console.pause("\nPress Enter to return to main menu...")?;
        }

        if signal.is_shutdown_requested() {
            tracing::info!("shutdown requested, exiting");
            break;
        }
    }

    tracing::info!("application terminated");
    Ok(())
}

fn run_hue<R: BufRead, W: Write>(
    config: &AppConfig,
    signal: &ShutdownSignal,
    console: &mut Console<R, W>,
    cycles: Option<u64>,
) -> light_control_core::Result<()> {
    tracing::info!(
        app = %config.app_name,
        device = %config.device_name,
        "setting up streaming bridge"
    );
    let mut bridge = SimulatedBridge::new(&config.bridge);

    let outcome = play_fade(config, signal, console, &mut bridge, cycles);

    bridge.shut_down()?;
    tracing::info!("bridge shutdown completed");
    outcome
}

fn play_fade<R: BufRead, W: Write>(
    config: &AppConfig,
    signal: &ShutdownSignal,
    console: &mut Console<R, W>,
    bridge: &mut SimulatedBridge,
    cycles: Option<u64>,
) -> light_control_core::Result<()> {
    if !connect_bridge(bridge, console, signal)? {
        if !signal.is_shutdown_requested() {
            tracing::warn!(
                "no streamable bridge available, configure an entertainment area in the Hue app"
            );
        }
        return Ok(());
    }

    let mut effect = FadeEffect::for_bridge(&*bridge, config.fade.clone());
    let mut ramp = PeriodicRamp::new(signal.clone());
    let report = effect.play(&mut ramp, cycles)?;
    if report.was_cancelled() {
        tracing::info!("fade effect interrupted by shutdown request");
    }
    Ok(())
}

fn run_video<C: SourceChooser + ?Sized>(
    config: &AppConfig,
    signal: &ShutdownSignal,
    chooser: &mut C,
) -> light_control_core::Result<()> {
    tracing::info!(source = %config.video.source_name, "initializing video receiver");
    let mut source = SyntheticSource::new(&config.video);

    let outcome = capture_video(config, signal, chooser, &mut source);

    source.shutdown();
    tracing::info!("video shutdown complete");
    outcome
}

fn capture_video<C: SourceChooser + ?Sized>(
    config: &AppConfig,
    signal: &ShutdownSignal,
    chooser: &mut C,
    source: &mut SyntheticSource,
) -> light_control_core::Result<()> {
    let selected = open_source(source, chooser, config.video.discovery_wait())?;
    tracing::info!(name = %selected.name, "connected to video source");

    let stats = VideoDebugSession::new(
        source,
        config.video.capture_timeout(),
        config.video.report_every,
    )
    .run(signal)?;
    tracing::info!(
        frames = stats.frames_processed,
        errors = stats.errors,
        "total frames processed"
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Light control debug harness", long_about = None)]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive menu to pick a debug mode (default).
    Menu,
    /// Connect to the bridge and fade the lights until Ctrl+C.
    Hue {
        /// Stop after this many full fade cycles.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Capture frames from a video source until Ctrl+C.
    Video {
        /// Index of the discovered source to connect to, skipping the prompt.
        #[arg(short, long)]
        source: Option<usize>,
    },
}
