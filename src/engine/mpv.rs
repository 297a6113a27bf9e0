//! mpv driven over its JSON IPC socket
//!
//! mpv runs as a child process in idle mode with the whole queue appended to
//! its playlist and `--loop-playlist=inf`. Requests carry a `request_id` and are
//! matched to replies by a background reader task, which also turns mpv events
//! into [`EngineEvent`]s and keeps the published [`PlaybackState`] current.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use super::{EngineError, EngineEvent, MediaEngine};
use crate::model::{PlayQueue, PlaybackState};

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const QUIT_TIMEOUT: Duration = Duration::from_secs(3);
const PAUSE_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

const OBSERVE_PAUSE: u64 = 1;
const OBSERVE_IDLE: u64 = 2;

#[derive(Clone, Debug)]
pub struct MpvOptions {
    pub binary: PathBuf,
    pub socket: PathBuf,
}

type Reply = Result<Option<Value>, String>;
type PendingReplies = Arc<StdMutex<HashMap<u64, oneshot::Sender<Reply>>>>;

pub struct MpvEngine {
    child: Mutex<Option<Child>>,
    writer: Mutex<OwnedWriteHalf>,
    pending: PendingReplies,
    next_request_id: AtomicU64,
    state: watch::Receiver<PlaybackState>,
    queue_len: usize,
}

impl MpvEngine {
    /// Starts mpv, connects to its IPC socket and loads `queue` into the
    /// playlist. Nothing plays until [`MediaEngine::play_index`] is called.
    pub async fn launch(
        options: &MpvOptions,
        queue: &PlayQueue,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), EngineError> {
        remove_stale_socket(&options.socket)?;

        tracing::info!(binary = %options.binary.display(), "Launching mpv");
        let mut child = Command::new(&options.binary)
            .arg("--idle=yes")
            .arg("--loop-playlist=inf")
            .arg("--fullscreen")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", options.socket.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Launch)?;

        let stream = connect(&options.socket, &mut child).await?;
        let (engine, events) = Self::attach(stream, Some(child), queue.len());

        engine
            .command(json!(["observe_property", OBSERVE_PAUSE, "pause"]))
            .await?;
        engine
            .command(json!(["observe_property", OBSERVE_IDLE, "idle-active"]))
            .await?;

        for path in queue.paths() {
            engine
                .command(json!(["loadfile", path.to_string_lossy(), "append"]))
                .await?;
        }

        tracing::info!(items = queue.len(), "Playlist loaded into mpv");
        Ok((engine, events))
    }

    /// Wraps an already connected IPC stream and spawns the reader task.
    fn attach(
        stream: UnixStream,
        child: Option<Child>,
        queue_len: usize,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (reader, writer) = stream.into_split();
        let pending: PendingReplies = Arc::new(StdMutex::new(HashMap::new()));
        let (state_tx, state_rx) = watch::channel(PlaybackState::Opening);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(reader, pending.clone(), state_tx, event_tx));

        let engine = Self {
            child: Mutex::new(child),
            writer: Mutex::new(writer),
            pending,
            next_request_id: AtomicU64::new(1),
            state: state_rx,
            queue_len,
        };
        (engine, event_rx)
    }

    async fn command(&self, args: Value) -> Result<Option<Value>, EngineError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending_replies().insert(request_id, tx);

        let mut line = serde_json::to_vec(&json!({ "command": &args, "request_id": request_id }))?;
        line.push(b'\n');

        tracing::trace!(request_id, command = %args, "mpv request");
        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_all(&line).await
        };
        if let Err(e) = written {
            self.pending_replies().remove(&request_id);
            return Err(e.into());
        }

        match tokio::time::timeout(REPLY_TIMEOUT, rx).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(reason))) => Err(EngineError::Rejected {
                command: args.to_string(),
                reason,
            }),
            Ok(Err(_)) => Err(EngineError::Disconnected),
            Err(_) => {
                self.pending_replies().remove(&request_id);
                Err(EngineError::Timeout(args.to_string()))
            }
        }
    }

    fn pending_replies(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the pause property, then waits for the matching `property-change`
    /// so [`MediaEngine::state`] reflects it before returning.
    async fn set_pause(&self, paused: bool) -> Result<(), EngineError> {
        self.command(json!(["set_property", "pause", paused])).await?;

        let wanted = if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        let mut state = self.state.clone();
        let settled = tokio::time::timeout(
            PAUSE_SETTLE_TIMEOUT,
            state.wait_for(|current| {
                *current == wanted
                    || !matches!(current, PlaybackState::Playing | PlaybackState::Paused)
            }),
        );
        let confirmed = matches!(settled.await, Ok(Ok(_)));
        if !confirmed {
            tracing::debug!(paused, "mpv did not confirm the pause change in time");
        }
        Ok(())
    }

    /// Asks mpv to quit and waits for the process, killing it if it hangs.
    pub async fn shutdown(&self, socket: &Path) {
        if let Err(e) = self.command(json!(["quit"])).await {
            tracing::debug!(error = %e, "mpv quit command failed");
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(QUIT_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(%status, "mpv exited"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed to wait for mpv"),
                Err(_) => {
                    tracing::warn!("mpv did not quit in time, killing it");
                    if let Err(e) = child.kill().await {
                        tracing::error!(error = %e, "Failed to kill mpv");
                    }
                }
            }
        }

        if let Err(e) = remove_stale_socket(socket) {
            tracing::debug!(error = %e, "Could not remove mpv socket");
        }
    }
}

impl MediaEngine for MpvEngine {
    fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    async fn play_index(&self, index: usize) -> Result<(), EngineError> {
        if index >= self.queue_len {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.queue_len,
            });
        }
        self.command(json!(["playlist-play-index", index])).await?;
        self.set_pause(false).await
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.set_pause(true).await
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.set_pause(false).await
    }

    async fn next(&self) -> Result<(), EngineError> {
        self.command(json!(["playlist-next"])).await?;
        Ok(())
    }

    async fn previous(&self) -> Result<(), EngineError> {
        self.command(json!(["playlist-prev"])).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.command(json!(["stop"])).await?;
        Ok(())
    }

    async fn current_index(&self) -> Result<Option<usize>, EngineError> {
        let data = self
            .command(json!(["get_property", "playlist-pos"]))
            .await?;
        Ok(data
            .and_then(|value| value.as_i64())
            .and_then(|pos| usize::try_from(pos).ok()))
    }
}

fn remove_stale_socket(socket: &Path) -> Result<(), EngineError> {
    match std::fs::remove_file(socket) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// mpv creates the socket some time after start, so retry for a while.
async fn connect(socket: &Path, child: &mut Child) -> Result<UnixStream, EngineError> {
    for _ in 0..CONNECT_ATTEMPTS {
        if let Some(status) = child.try_wait()? {
            return Err(EngineError::Exited(status));
        }
        match UnixStream::connect(socket).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::trace!(error = %e, "mpv socket not ready yet");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
    Err(EngineError::ConnectTimeout(socket.display().to_string()))
}

/// One line of mpv IPC output: either a command reply or an event
#[derive(Debug, Deserialize)]
struct IpcMessage {
    event: Option<String>,
    request_id: Option<u64>,
    error: Option<String>,
    data: Option<Value>,
    name: Option<String>,
    reason: Option<String>,
    file_error: Option<String>,
}

async fn read_loop(
    reader: OwnedReadHalf,
    pending: PendingReplies,
    state_tx: watch::Sender<PlaybackState>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    let mut lines = BufReader::new(reader).lines();
    let mut tracker = StateTracker::default();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Reading from mpv failed");
                break;
            }
        };

        let message: IpcMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "Ignoring malformed mpv message");
                continue;
            }
        };

        if message.event.is_none() {
            if let Some(request_id) = message.request_id {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&request_id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(reply_of(message));
                }
            }
            continue;
        }

        let event = tracker.apply(&message);
        state_tx.send_replace(tracker.state());
        if let Some(event) = event {
            let _ = events.send(event);
        }
    }

    tracing::debug!("mpv IPC connection closed");
    let event = tracker.disconnected();
    state_tx.send_replace(tracker.state());
    if let Some(event) = event {
        let _ = events.send(event);
    }
    // Dropping the senders wakes every outstanding request with Disconnected.
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

fn reply_of(message: IpcMessage) -> Reply {
    match message.error.as_deref() {
        Some("success") | None => Ok(message.data),
        Some(reason) => Err(reason.to_string()),
    }
}

/// Derives [`PlaybackState`] from the mpv event stream
#[derive(Debug, Default)]
struct StateTracker {
    state: PlaybackState,
    paused: bool,
    started: bool,
}

impl StateTracker {
    fn state(&self) -> PlaybackState {
        self.state
    }

    fn apply(&mut self, message: &IpcMessage) -> Option<EngineEvent> {
        if self.state == PlaybackState::Error {
            return None;
        }

        match message.event.as_deref()? {
            "start-file" => {
                self.started = true;
                None
            }
            "file-loaded" => {
                self.started = true;
                self.state = if self.paused {
                    PlaybackState::Paused
                } else {
                    PlaybackState::Playing
                };
                Some(EngineEvent::ItemStarted)
            }
            "end-file" if message.reason.as_deref() == Some("error") => {
                self.state = PlaybackState::Error;
                let detail = message
                    .file_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                Some(EngineEvent::PlaybackError(detail))
            }
            "property-change" => self.apply_property(message),
            _ => None,
        }
    }

    fn apply_property(&mut self, message: &IpcMessage) -> Option<EngineEvent> {
        let value = message.data.as_ref().and_then(Value::as_bool);
        match (message.name.as_deref(), value) {
            (Some("pause"), Some(paused)) => {
                self.paused = paused;
                if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
                    self.state = if paused {
                        PlaybackState::Paused
                    } else {
                        PlaybackState::Playing
                    };
                }
                None
            }
            (Some("idle-active"), Some(false)) => {
                self.started = true;
                None
            }
            (Some("idle-active"), Some(true))
                if self.started && self.state != PlaybackState::Stopped =>
            {
                self.state = PlaybackState::Stopped;
                Some(EngineEvent::ListStopped)
            }
            _ => None,
        }
    }

    /// mpv going away without a stop is a failure.
    fn disconnected(&mut self) -> Option<EngineEvent> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = PlaybackState::Error;
        Some(EngineEvent::PlaybackError("mpv exited".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    fn message(line: &str) -> IpcMessage {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_file_loaded_starts_playing() {
        let mut tracker = StateTracker::default();
        assert_eq!(tracker.state(), PlaybackState::Opening);

        let event = tracker.apply(&message(r#"{"event":"file-loaded"}"#));
        assert_eq!(event, Some(EngineEvent::ItemStarted));
        assert_eq!(tracker.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_pause_property_tracks_state() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(r#"{"event":"file-loaded"}"#));

        let paused = r#"{"event":"property-change","id":1,"name":"pause","data":true}"#;
        assert_eq!(tracker.apply(&message(paused)), None);
        assert_eq!(tracker.state(), PlaybackState::Paused);

        let resumed = r#"{"event":"property-change","id":1,"name":"pause","data":false}"#;
        tracker.apply(&message(resumed));
        assert_eq!(tracker.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_pause_before_first_file_stays_opening() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(
            r#"{"event":"property-change","id":1,"name":"pause","data":true}"#,
        ));
        assert_eq!(tracker.state(), PlaybackState::Opening);

        // A file loaded while paused shows up as paused
        tracker.apply(&message(r#"{"event":"file-loaded"}"#));
        assert_eq!(tracker.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_initial_idle_is_not_a_stop() {
        let mut tracker = StateTracker::default();
        let idle = r#"{"event":"property-change","id":2,"name":"idle-active","data":true}"#;
        assert_eq!(tracker.apply(&message(idle)), None);
        assert_eq!(tracker.state(), PlaybackState::Opening);
    }

    #[test]
    fn test_idle_after_playback_is_a_stop() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(r#"{"event":"file-loaded"}"#));

        let idle = r#"{"event":"property-change","id":2,"name":"idle-active","data":true}"#;
        assert_eq!(tracker.apply(&message(idle)), Some(EngineEvent::ListStopped));
        assert_eq!(tracker.state(), PlaybackState::Stopped);

        // Reported once
        assert_eq!(tracker.apply(&message(idle)), None);
        assert_eq!(tracker.disconnected(), None);
        assert_eq!(tracker.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_stop_before_first_file_loaded_is_a_stop() {
        let mut tracker = StateTracker::default();
        for line in [
            r#"{"event":"property-change","id":2,"name":"idle-active","data":true}"#,
            r#"{"event":"property-change","id":2,"name":"idle-active","data":false}"#,
            r#"{"event":"start-file","playlist_entry_id":1}"#,
            r#"{"event":"end-file","reason":"stop","playlist_entry_id":1}"#,
        ] {
            assert_eq!(tracker.apply(&message(line)), None);
            assert_eq!(tracker.state(), PlaybackState::Opening);
        }

        let idle = r#"{"event":"property-change","id":2,"name":"idle-active","data":true}"#;
        assert_eq!(tracker.apply(&message(idle)), Some(EngineEvent::ListStopped));
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_start_file_alone_marks_playback_started() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(r#"{"event":"start-file"}"#));
        let idle = r#"{"event":"property-change","id":2,"name":"idle-active","data":true}"#;
        assert_eq!(tracker.apply(&message(idle)), Some(EngineEvent::ListStopped));
        assert_eq!(tracker.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_end_file_error_is_terminal() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(r#"{"event":"file-loaded"}"#));

        let failed = r#"{"event":"end-file","reason":"error","file_error":"unrecognized file format"}"#;
        assert_eq!(
            tracker.apply(&message(failed)),
            Some(EngineEvent::PlaybackError("unrecognized file format".to_string()))
        );
        assert_eq!(tracker.state(), PlaybackState::Error);

        assert_eq!(tracker.apply(&message(r#"{"event":"file-loaded"}"#)), None);
        assert_eq!(tracker.state(), PlaybackState::Error);
    }

    #[test]
    fn test_end_file_at_eof_is_ignored() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(r#"{"event":"file-loaded"}"#));
        assert_eq!(tracker.apply(&message(r#"{"event":"end-file","reason":"eof"}"#)), None);
        assert_eq!(tracker.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_unexpected_disconnect_is_an_error() {
        let mut tracker = StateTracker::default();
        tracker.apply(&message(r#"{"event":"file-loaded"}"#));
        assert!(matches!(
            tracker.disconnected(),
            Some(EngineEvent::PlaybackError(_))
        ));
        assert_eq!(tracker.state(), PlaybackState::Error);
    }

    #[test]
    fn test_reply_parsing() {
        let ok = message(r#"{"error":"success","data":3,"request_id":7}"#);
        assert_eq!(reply_of(ok), Ok(Some(json!(3))));

        let rejected = message(r#"{"error":"property unavailable","request_id":8}"#);
        assert_eq!(reply_of(rejected), Err("property unavailable".to_string()));
    }

    /// Minimal mpv stand-in: answers every request, reports playlist-pos 2 and
    /// emits `file-loaded` after `playlist-play-index`.
    async fn fake_mpv(listener: UnixListener) -> Vec<Value> {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let mut seen = Vec::new();

        while let Some(line) = lines.next_line().await.unwrap() {
            let request: Value = serde_json::from_str(&line).unwrap();
            let request_id = request["request_id"].as_u64().unwrap();
            let command = request["command"].clone();

            let reply = match command[0].as_str() {
                Some("get_property") => json!({"error": "success", "data": 2, "request_id": request_id}),
                Some("playlist-prev") => json!({"error": "error running command", "request_id": request_id}),
                _ => json!({"error": "success", "request_id": request_id}),
            };
            writer.write_all(format!("{reply}\n").as_bytes()).await.unwrap();

            if command[0] == "playlist-play-index" {
                writer.write_all(b"{\"event\":\"file-loaded\"}\n").await.unwrap();
            }
            if command[0] == "set_property" && command[1] == "pause" {
                // mpv reports the property change only after the reply
                tokio::time::sleep(Duration::from_millis(20)).await;
                let change = json!({"event": "property-change", "id": OBSERVE_PAUSE, "name": "pause", "data": command[2]});
                writer.write_all(format!("{change}\n").as_bytes()).await.unwrap();
            }
            seen.push(command);
        }
        seen
    }

    #[tokio::test]
    async fn test_commands_round_trip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = tokio::spawn(fake_mpv(listener));

        let stream = UnixStream::connect(&socket).await.unwrap();
        let (engine, mut events) = MpvEngine::attach(stream, None, 3);
        assert_eq!(engine.state(), PlaybackState::Opening);

        engine.play_index(1).await.unwrap();
        assert_eq!(events.recv().await, Some(EngineEvent::ItemStarted));
        assert_eq!(engine.state(), PlaybackState::Playing);

        assert_eq!(engine.current_index().await.unwrap(), Some(2));

        engine.pause().await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Paused);
        engine.resume().await.unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);

        engine.next().await.unwrap();
        assert!(matches!(
            engine.previous().await,
            Err(EngineError::Rejected { .. })
        ));
        assert!(matches!(
            engine.play_index(3).await,
            Err(EngineError::IndexOutOfRange { index: 3, len: 3 })
        ));

        drop(engine);
        let seen = server.await.unwrap();
        assert_eq!(
            seen,
            vec![
                json!(["playlist-play-index", 1]),
                json!(["set_property", "pause", false]),
                json!(["get_property", "playlist-pos"]),
                json!(["set_property", "pause", true]),
                json!(["set_property", "pause", false]),
                json!(["playlist-next"]),
                json!(["playlist-prev"]),
            ]
        );
    }
}
