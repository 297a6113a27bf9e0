//! Media engine seam
//!
//! The controller talks to the player only through [`MediaEngine`]. Engine
//! notifications travel the other way over an [`EngineEvent`] channel, so no
//! controller code ever runs on an engine-owned thread.

mod mpv;

use std::future::Future;

use thiserror::Error;

use crate::model::PlaybackState;

pub use mpv::{MpvEngine, MpvOptions};

/// Notifications produced by the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// A playlist item started playing
    ItemStarted,
    /// The playlist stopped and the engine went idle
    ListStopped,
    /// Playback failed; the engine is now in [`PlaybackState::Error`]
    PlaybackError(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch media engine: {0}")]
    Launch(#[source] std::io::Error),
    #[error("media engine exited early with {0}")]
    Exited(std::process::ExitStatus),
    #[error("media engine IPC socket did not come up at {0}")]
    ConnectTimeout(String),
    #[error("media engine IPC failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed media engine message: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("media engine rejected `{command}`: {reason}")]
    Rejected { command: String, reason: String },
    #[error("playlist index {index} is out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("media engine did not answer `{0}`")]
    Timeout(String),
    #[error("media engine connection closed")]
    Disconnected,
}

/// Commands and queries the controller needs from a player
pub trait MediaEngine: Send + Sync + 'static {
    /// Current playback state; cheap, never blocks on the engine.
    fn state(&self) -> PlaybackState;

    fn play_index(&self, index: usize) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn pause(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn resume(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Moves forward one item, wrapping at the end of the playlist.
    fn next(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Moves back one item, wrapping at the start of the playlist.
    fn previous(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Index of the loaded playlist item, if any.
    fn current_index(&self) -> impl Future<Output = Result<Option<usize>, EngineError>> + Send;
}
