//! Engine event handling

use crate::engine::{EngineEvent, MediaEngine};
use crate::screen::ScreenPower;

use super::PlayerController;

impl<E: MediaEngine, B: ScreenPower> PlayerController<E, B> {
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::ItemStarted => self.persist_current_index().await,
            EngineEvent::ListStopped => {
                tracing::info!("Media player is stopped");
            }
            EngineEvent::PlaybackError(detail) => {
                tracing::error!(detail = %detail, "Playback error, giving up");
            }
        }
    }

    /// Write-through of the item that just started.
    async fn persist_current_index(&self) {
        let index = match self.engine.current_index().await {
            Ok(Some(index)) => index,
            Ok(None) => {
                tracing::debug!("Item started but engine reports no playlist position");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to query current item");
                return;
            }
        };

        if let Some(path) = self.queue.get(index) {
            tracing::info!(index, path = %path.display(), "Now playing");
        }

        match self.store.save(index) {
            Ok(()) => tracing::debug!(index, "Resume index saved"),
            Err(e) => tracing::error!(error = %format!("{e:#}"), index, "Failed to save resume index"),
        }
    }
}
