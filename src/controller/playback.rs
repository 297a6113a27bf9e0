//! Playback control methods

use anyhow::Result;

use crate::engine::MediaEngine;
use crate::model::PlaybackState;
use crate::screen::ScreenPower;

use super::PlayerController;

impl<E: MediaEngine, B: ScreenPower> PlayerController<E, B> {
    pub async fn toggle_play_pause(&self) -> Result<()> {
        match self.engine.state() {
            PlaybackState::Playing => {
                self.engine.pause().await?;
                tracing::info!("Playback paused");
            }
            PlaybackState::Paused => {
                self.engine.resume().await?;
                tracing::info!("Playback resumed");
            }
            state => tracing::debug!(?state, "Nothing to toggle"),
        }
        Ok(())
    }

    pub async fn next_item(&self) -> Result<()> {
        tracing::debug!("Skipping to next item");
        self.engine.next().await?;
        Ok(())
    }

    pub async fn previous_item(&self) -> Result<()> {
        tracing::debug!("Going back to previous item");
        self.engine.previous().await?;
        Ok(())
    }

    /// Stopping the engine ends the run loop.
    pub async fn stop(&self) -> Result<()> {
        tracing::info!("Stopping playback");
        self.engine.stop().await?;
        Ok(())
    }
}
