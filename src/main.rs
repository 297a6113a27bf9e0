mod config;
mod controller;
mod engine;
mod input;
mod logging;
mod model;
mod screen;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Notify};

use config::{Cli, Settings};
use controller::PlayerController;
use engine::{MpvEngine, MpvOptions};
use model::{KeyMap, PlayQueue, ResumeStore, Termination};
use screen::SysfsBacklight;

const STARTUP_FAILURE_EXIT_CODE: u8 = 2;
const KEY_QUEUE_DEPTH: usize = 16;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== loop-kiosk starting ===");
    let settings = Settings::from_cli(cli);

    match run(settings).await {
        Ok(termination) => {
            tracing::info!(?termination, "loop-kiosk shutting down");
            ExitCode::from(termination.exit_code())
        }
        Err(e) => {
            tracing::error!(error = ?e, "Startup failed");
            ExitCode::from(STARTUP_FAILURE_EXIT_CODE)
        }
    }
}

/// Startup errors bubble up as `Err`; once playback runs, the result is how
/// it ended.
async fn run(settings: Settings) -> Result<Termination> {
    let queue = PlayQueue::scan(settings.input_dir(), &settings.extension)?;
    if queue.is_empty() {
        bail!(
            "No .{} files found under {}",
            settings.extension,
            settings.input_dir().display()
        );
    }

    let options = MpvOptions {
        binary: settings.mpv_binary.clone(),
        socket: settings.mpv_socket.clone(),
    };
    let queue = Arc::new(queue);
    let (engine, engine_events) = MpvEngine::launch(&options, &queue)
        .await
        .context("Failed to start mpv")?;
    let engine = Arc::new(engine);

    let controller = PlayerController::new(
        engine.clone(),
        Arc::new(SysfsBacklight::new(&settings.backlight_path)),
        ResumeStore::new(&settings.resume_file),
        queue,
        KeyMap::default(),
    );

    if let Err(e) = controller.start().await {
        engine.shutdown(&options.socket).await;
        return Err(e);
    }

    let interrupt = Arc::new(Notify::new());
    let (key_tx, key_rx) = mpsc::channel(KEY_QUEUE_DEPTH);
    let input = input::spawn(key_tx, interrupt.clone());

    let dispatcher = tokio::spawn(controller.clone().dispatch(key_rx, engine_events));

    let stopper = {
        let controller = controller.clone();
        tokio::spawn(async move {
            match wait_for_interrupt(&interrupt).await {
                Ok(()) => {
                    tracing::info!("Interrupted, stopping playback");
                    if let Err(e) = controller.stop().await {
                        tracing::error!(error = %e, "Failed to stop playback");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Signal handling unavailable"),
            }
        })
    };

    let termination = controller
        .run_until_terminated(settings.poll_interval)
        .await;

    stopper.abort();
    drop(input);
    engine.shutdown(&options.socket).await;
    dispatcher.abort();

    Ok(termination)
}

async fn wait_for_interrupt(keyboard: &Notify) -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
        _ = keyboard.notified() => {}
    }
    Ok(())
}
