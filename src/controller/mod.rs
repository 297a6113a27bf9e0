//! Controller module - Playback state machine and event handling
//!
//! The controller reacts to key presses and engine events, persists the resume
//! index and couples screen power to playback. It is organized into submodules
//! by responsibility:
//!
//! - `input`: Key press handling and the screen-off guard
//! - `playback`: Play/pause/skip/stop commands
//! - `screen`: Backlight toggle and pause/resume coupling
//! - `player_events`: Engine event handling and resume persistence
//!
//! All handlers run on the single dispatcher loop in [`PlayerController::dispatch`].

mod input;
mod playback;
mod player_events;
mod screen;


use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};

use crate::engine::{EngineEvent, MediaEngine};
use crate::model::{KeyMap, PlayQueue, PlaybackState, ResumeStore, ScreenState, Termination};
use crate::screen::ScreenPower;

pub struct PlayerController<E, B> {
    pub(crate) engine: Arc<E>,
    pub(crate) backlight: Arc<B>,
    pub(crate) store: ResumeStore,
    pub(crate) queue: Arc<PlayQueue>,
    pub(crate) screen: Arc<Mutex<ScreenState>>,
    pub(crate) keys: KeyMap,
}

impl<E, B> Clone for PlayerController<E, B> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            backlight: self.backlight.clone(),
            store: self.store.clone(),
            queue: self.queue.clone(),
            screen: self.screen.clone(),
            keys: self.keys.clone(),
        }
    }
}

impl<E: MediaEngine, B: ScreenPower> PlayerController<E, B> {
    pub fn new(
        engine: Arc<E>,
        backlight: Arc<B>,
        store: ResumeStore,
        queue: Arc<PlayQueue>,
        keys: KeyMap,
    ) -> Self {
        Self {
            engine,
            backlight,
            store,
            queue,
            screen: Arc::new(Mutex::new(ScreenState::default())),
            keys,
        }
    }

    /// Starts playback at the persisted resume index, or at the first item
    /// when no index was saved yet.
    pub async fn start(&self) -> Result<()> {
        let index = match self.store.load()? {
            Some(index) => {
                tracing::info!(index, file = %self.store.path().display(), "Resuming playback");
                index
            }
            None => {
                tracing::info!("No resume index found, playing from the beginning");
                0
            }
        };

        self.engine
            .play_index(index)
            .await
            .with_context(|| format!("Failed to start playback at index {index}"))
    }

    /// Serializes key presses and engine events onto one loop. Returns once
    /// both channels are closed.
    pub async fn dispatch(
        self,
        mut keys: mpsc::Receiver<String>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let mut keys_open = true;
        let mut events_open = true;

        while keys_open || events_open {
            tokio::select! {
                key = keys.recv(), if keys_open => match key {
                    Some(key) => {
                        self.handle_key(&key).await;
                    }
                    None => {
                        tracing::debug!("Key channel closed");
                        keys_open = false;
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_engine_event(event).await,
                    None => {
                        tracing::debug!("Engine event channel closed");
                        events_open = false;
                    }
                },
            }
        }
    }

    /// Polls the engine state every `interval` and returns once playback has
    /// stopped or failed.
    pub async fn run_until_terminated(&self, interval: Duration) -> Termination {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            match self.engine.state() {
                PlaybackState::Stopped => return Termination::Stopped,
                PlaybackState::Error => return Termination::EngineError,
                _ => {}
            }
        }
    }
}
