//! Screen power toggle

use anyhow::{Context, Result};

use crate::engine::MediaEngine;
use crate::model::PlaybackState;
use crate::screen::{BacklightPower, ScreenPower};

use super::PlayerController;

impl<E: MediaEngine, B: ScreenPower> PlayerController<E, B> {
    /// Flips the backlight. Turning the screen off pauses playback if it was
    /// running; turning it back on resumes only a pause made by the screen-off.
    ///
    /// Screen state is left untouched when the backlight cannot be read or
    /// written.
    pub async fn toggle_screen(&self) -> Result<()> {
        let mut screen = self.screen.lock().await;

        let current = self
            .backlight
            .read()
            .context("Failed to read backlight state")?;
        let target = current.toggled();
        self.backlight
            .write(target)
            .context("Failed to write backlight state")?;

        tracing::info!(?target, "Backlight toggled");

        match target {
            BacklightPower::Off => {
                screen.enabled = false;
                screen.was_playing_before_off = self.engine.state() == PlaybackState::Playing;
                if screen.was_playing_before_off {
                    self.engine.pause().await?;
                    tracing::debug!("Paused for screen off");
                }
            }
            BacklightPower::On => {
                screen.enabled = true;
                if std::mem::take(&mut screen.was_playing_before_off) {
                    self.engine.resume().await?;
                    tracing::debug!("Resumed after screen on");
                }
            }
        }

        Ok(())
    }
}
