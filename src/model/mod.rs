//! Model module - Playlist, persisted state and core type definitions
//!
//! - `types`: Playback/screen state and key command enums
//! - `playlist`: The looping play queue built from a directory scan
//! - `resume`: On-disk resume index

mod playlist;
mod resume;
mod types;

pub use playlist::PlayQueue;
pub use resume::ResumeStore;
pub use types::{KeyMap, KioskCommand, PlaybackState, ScreenState, Termination};
