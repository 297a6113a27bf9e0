//! Console key capture
//!
//! Puts the terminal into raw mode and forwards every key press as a short
//! identifier (`"0"`, `"a"`, `"f5"`, `"enter"`, ...). Ctrl+C cannot raise
//! SIGINT in raw mode, so it is reported on a separate [`Notify`].

use std::io::IsTerminal;
use std::sync::Arc;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

/// Stops key capture and restores the terminal when dropped
pub struct InputHandle {
    task: Option<JoinHandle<()>>,
    raw_mode: bool,
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.raw_mode {
            if let Err(e) = disable_raw_mode() {
                tracing::warn!(error = %e, "Failed to restore terminal mode");
            }
        }
    }
}

pub fn spawn(key_tx: mpsc::Sender<String>, interrupt: Arc<Notify>) -> InputHandle {
    if !std::io::stdin().is_terminal() {
        tracing::warn!("stdin is not a terminal, keyboard control disabled");
        return InputHandle {
            task: None,
            raw_mode: false,
        };
    }

    let raw_mode = match enable_raw_mode() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Could not enable raw mode, keys arrive line-buffered");
            false
        }
    };

    let task = tokio::spawn(read_keys(key_tx, interrupt));
    tracing::info!("Keyboard control active");

    InputHandle {
        task: Some(task),
        raw_mode,
    }
}

async fn read_keys(key_tx: mpsc::Sender<String>, interrupt: Arc<Notify>) {
    let mut events = EventStream::new();

    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if is_interrupt(&key) {
                    interrupt.notify_one();
                    continue;
                }
                if key_tx.send(key_name(&key)).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Reading keyboard events failed");
                break;
            }
        }
    }

    tracing::debug!("Key capture ended");
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

/// Identifier the key map is looked up with.
pub fn key_name(key: &KeyEvent) -> String {
    match key.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::F(n) => format!("f{n}"),
        other => format!("{other:?}").to_lowercase(),
    }
}
