//! Logging setup for loop-kiosk
//!
//! Every line goes to a fixed log file and to the console. The console writer
//! emits `\r\n` line endings because the terminal sits in raw mode while keys
//! are being captured.

use std::io::{self, Write};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const LOG_DIR: &str = ".logs";
pub const LOG_FILE_NAME: &str = "loop-kiosk.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Initialize the logging system.
///
/// The log level can be controlled via the `RUST_LOG` environment variable.
/// Default: `loop_kiosk` modules at DEBUG, everything else at WARN.
///
/// The returned guard flushes the file writer when dropped, so the caller must
/// keep it alive until the process exits.
pub fn init_logging() -> anyhow::Result<WorkerGuard> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = tracing_appender::rolling::never(LOG_DIR, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("loop_kiosk=debug,warn"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()));

    let console_layer = fmt::layer()
        .with_writer(RawConsole)
        .with_target(true)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/{}", LOG_DIR, LOG_FILE_NAME);

    Ok(guard)
}

/// Stderr writer that is safe to use while the terminal is in raw mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawConsole;

impl<'a> MakeWriter<'a> for RawConsole {
    type Writer = CrlfWriter<io::StderrLock<'static>>;

    fn make_writer(&'a self) -> Self::Writer {
        CrlfWriter::new(io::stderr().lock())
    }
}

/// Rewrites bare `\n` into `\r\n`.
pub struct CrlfWriter<W: Write> {
    inner: W,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, byte) in buf.iter().enumerate() {
            if *byte == b'\n' && (i == 0 || buf[i - 1] != b'\r') {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
