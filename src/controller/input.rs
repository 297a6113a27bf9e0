//! Key press handling

use crate::engine::MediaEngine;
use crate::model::KioskCommand;
use crate::screen::ScreenPower;

use super::PlayerController;

/// What a key press ended up doing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Applied(KioskCommand),
    /// Dropped because the screen is off
    Ignored(KioskCommand),
    Unsupported(String),
    Failed(KioskCommand),
}

impl<E: MediaEngine, B: ScreenPower> PlayerController<E, B> {
    pub async fn handle_key(&self, key: &str) -> KeyOutcome {
        let Some(command) = self.keys.resolve(key) else {
            tracing::warn!(key, "Key not supported");
            return KeyOutcome::Unsupported(key.to_string());
        };

        if !command.allowed_with_screen_off() && !self.screen.lock().await.enabled {
            tracing::info!(key, %command, "Screen is off, ignoring command");
            return KeyOutcome::Ignored(command);
        }

        tracing::debug!(key, %command, "Key pressed");

        let result = match command {
            KioskCommand::TogglePlayPause => self.toggle_play_pause().await,
            KioskCommand::Next => self.next_item().await,
            KioskCommand::Previous => self.previous_item().await,
            KioskCommand::ToggleScreen => self.toggle_screen().await,
            KioskCommand::Stop => self.stop().await,
        };

        match result {
            Ok(()) => KeyOutcome::Applied(command),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), %command, "Command failed");
                KeyOutcome::Failed(command)
            }
        }
    }
}
