//! Per-batch logging handle
//!
//! A batch owns its log explicitly instead of relying on a process-wide
//! logger: [`BatchLog::open`] builds a dispatcher that writes terse lines to
//! the console and bracketed, timestamped lines to a log file, the batch
//! future runs under that dispatcher, and [`BatchLog::close`] flushes the file.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::error::{GradeError, GradeResult};

/// Timestamp used in run directory and log file names
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Buffered log file shared between the layer's writers
#[derive(Clone)]
struct SharedFile(Arc<Mutex<BufWriter<File>>>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = SharedFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// `[LEVEL timestamp]: message` lines
struct BracketFormat;

impl<S, N> FormatEvent<S, N> for BracketFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        write!(writer, "[{} {}]: ", event.metadata().level(), now)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Logging handle for one grading batch
pub struct BatchLog {
    dispatch: Dispatch,
    file: Option<SharedFile>,
    path: Option<PathBuf>,
}

impl BatchLog {
    /// Create `<log_dir>/<name>-<timestamp>.log` and a dispatcher writing to
    /// it at INFO and above. With `echo`, messages are mirrored to stderr.
    pub fn open(name: &str, log_dir: impl AsRef<Path>, echo: bool) -> GradeResult<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).map_err(|e| GradeError::io(log_dir, e))?;

        let path = log_dir.join(format!("{}-{}.log", name, timestamp()));
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| GradeError::io(&path, e))?;
        let shared = SharedFile(Arc::new(Mutex::new(BufWriter::new(file))));

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .event_format(BracketFormat)
            .with_writer(shared.clone());
        let console_layer = echo.then(|| {
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_level(false)
                .with_target(false)
                .with_writer(io::stderr)
        });

        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::INFO)
            .with(file_layer)
            .with(console_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            file: Some(shared),
            path: Some(path),
        })
    }

    /// Reuse whatever dispatcher is current; nothing to flush on close
    pub fn inherit() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
            file: None,
            path: None,
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Location of the log file, if this handle owns one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush buffered lines to disk
    pub fn close(self) -> GradeResult<()> {
        if let Some(mut file) = self.file {
            file.flush().map_err(|e| {
                GradeError::io(self.path.as_deref().unwrap_or(Path::new("<log>")), e)
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BatchLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLog").field("path", &self.path).finish()
    }
}
