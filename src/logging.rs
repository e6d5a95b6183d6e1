//! Logging System
//!
//! Structured logging using the `tracing` crate. Process-wide output is
//! configured once by [`init_logging`]. On top of that, every persisted
//! generation gets its own log file next to the stored artifact:
//!
//! - [`ArtifactLog`] owns that file. It is a handle passed explicitly to the
//!   setup, which can write artifact-local notes that go nowhere else.
//! - While the setup runs, the engine enters the span owned by the handle.
//!   [`ArtifactLogLayer`] copies every event emitted inside that span into the
//!   same file, so ordinary `tracing` diagnostics end up there too.
//! - Dropping (or closing) the handle detaches the sink from its span and
//!   flushes the file. Nested generations own nested spans; an event is only
//!   written to the innermost sink.

use crate::error::{DispenseError, StorageError};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::span::Entered;
use tracing::{Event, Level, Span, Subscriber};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt as subscriber_fmt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (if output is "file"); defaults to the platform data dir
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Default process log file: `{data_local_dir}/memogen.log`
pub fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "memogen")
        .map(|dirs| dirs.data_local_dir().join("memogen.log"))
        .unwrap_or_else(|| PathBuf::from(".memogen/memogen.log"))
}

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. Environment variables (MEMOGEN_LOG, MEMOGEN_LOG_FORMAT, MEMOGEN_LOG_OUTPUT)
/// 2. Configuration
/// 3. Defaults
///
/// The level filter applies to the process output only; artifact log files
/// use their own level.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), DispenseError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let json = format == "json";
    let process_layer: Box<dyn Layer<Registry> + Send + Sync> = match output {
        Output::File => {
            let log_file = config
                .and_then(|c| c.file.clone())
                .unwrap_or_else(default_log_file);
            let writer = std::sync::Mutex::new(open_append(&log_file)?);
            if json {
                subscriber_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer)
                    .with_filter(filter)
                    .boxed()
            } else {
                subscriber_fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(filter)
                    .boxed()
            }
        }
        Output::Stdout if json => subscriber_fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(std::io::stdout)
            .with_filter(filter)
            .boxed(),
        Output::Stdout => subscriber_fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(use_color)
            .with_writer(std::io::stdout)
            .with_filter(filter)
            .boxed(),
        Output::Stderr if json => subscriber_fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        Output::Stderr => subscriber_fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(use_color)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    Registry::default()
        .with(process_layer)
        .with(ArtifactLogLayer::new())
        .try_init()
        .map_err(|e| DispenseError::Configuration(format!("Failed to install logger: {}", e)))
}

fn open_append(path: &Path) -> Result<File, DispenseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DispenseError::Configuration(format!("Failed to create log directory: {}", e))
        })?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            DispenseError::Configuration(format!("Failed to open log file {:?}: {}", path, e))
        })
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, DispenseError> {
    if let Ok(filter) = EnvFilter::try_from_env("MEMOGEN_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(directive.parse().map_err(|e| {
                DispenseError::Configuration(format!("Invalid log directive: {}", e))
            })?);
        }
    }

    Ok(filter)
}

/// Determine output format from config or environment
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, DispenseError> {
    if let Ok(format) = std::env::var("MEMOGEN_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(DispenseError::Configuration(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }

    Ok(format.to_string())
}

/// Process log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<Output, DispenseError> {
    if let Ok(output) = std::env::var("MEMOGEN_LOG_OUTPUT") {
        return parse_output(&output);
    }
    parse_output(config.map(|c| c.output.as_str()).unwrap_or("stderr"))
}

fn parse_output(output: &str) -> Result<Output, DispenseError> {
    match output {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        _ => Err(DispenseError::Configuration(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            output
        ))),
    }
}

/// Open log file of one artifact
struct ArtifactSink {
    level: Level,
    writer: Mutex<LineWriter<File>>,
}

impl ArtifactSink {
    fn write_line(&self, level: Level, target: &str, message: &str) {
        // tracing orders levels by verbosity: TRACE > DEBUG > INFO > ...
        if level > self.level {
            return;
        }
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut writer = self.writer.lock();
        // A failed log line must not fail the generation.
        let _ = writeln!(writer, "{} {:>5} {}: {}", timestamp, level, target, message);
    }

    fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

/// Span extension marking a span as the owner of an artifact sink
struct SinkSlot(Arc<ArtifactSink>);

/// Target used for notes written through [`ArtifactLog`] directly
pub const ARTIFACT_LOG_TARGET: &str = "memogen::artifact";

/// Handle to the log file of one artifact generation
///
/// A disabled handle (no store, or persistence turned off) accepts every call
/// and writes nothing.
pub struct ArtifactLog {
    sink: Option<Arc<ArtifactSink>>,
    path: Option<PathBuf>,
    span: Span,
}

impl ArtifactLog {
    /// Create (truncating) the log file at `path` and attach it to a new span.
    pub fn open(path: &Path, level: Level) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let sink = Arc::new(ArtifactSink {
            level,
            writer: Mutex::new(LineWriter::new(file)),
        });

        // The span level only decides whether subscribers see the span at all.
        let span = tracing::error_span!("artifact", log = %path.display());
        span.with_subscriber(|(id, dispatch)| {
            if let Some(registry) = dispatch.downcast_ref::<Registry>() {
                if let Some(span_ref) = registry.span(id) {
                    span_ref.extensions_mut().insert(SinkSlot(Arc::clone(&sink)));
                }
            }
        });

        Ok(Self {
            sink: Some(sink),
            path: Some(path.to_path_buf()),
            span,
        })
    }

    /// Handle that discards everything
    pub fn disabled() -> Self {
        Self {
            sink: None,
            path: None,
            span: Span::none(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Path of the log file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Route process diagnostics into this log until the guard is dropped.
    pub fn enter(&self) -> Entered<'_> {
        self.span.enter()
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.note(Level::ERROR, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.note(Level::WARN, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.note(Level::INFO, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.note(Level::DEBUG, message);
    }

    fn note(&self, level: Level, message: impl fmt::Display) {
        if let Some(sink) = &self.sink {
            sink.write_line(level, ARTIFACT_LOG_TARGET, &message.to_string());
        }
    }

    /// Detach from the span and flush, reporting flush failures.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.detach().map_err(StorageError::from)
    }

    fn detach(&mut self) -> std::io::Result<()> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => return Ok(()),
        };
        self.span.with_subscriber(|(id, dispatch)| {
            if let Some(registry) = dispatch.downcast_ref::<Registry>() {
                if let Some(span_ref) = registry.span(id) {
                    span_ref.extensions_mut().remove::<SinkSlot>();
                }
            }
        });
        sink.flush()
    }
}

impl Drop for ArtifactLog {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

impl fmt::Debug for ArtifactLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactLog")
            .field("path", &self.path)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Layer copying events emitted inside an artifact span into its log file
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactLogLayer;

impl ArtifactLogLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ArtifactLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let scope = match ctx.event_scope(event) {
            Some(scope) => scope,
            None => return,
        };
        for span in scope {
            let extensions = span.extensions();
            if let Some(SinkSlot(sink)) = extensions.get::<SinkSlot>() {
                let mut visitor = EventText::default();
                event.record(&mut visitor);
                let metadata = event.metadata();
                sink.write_line(*metadata.level(), metadata.target(), &visitor.finish());
                return;
            }
        }
    }
}

/// Flattens an event into `message key=value ...`
#[derive(Default)]
struct EventText {
    message: String,
    fields: String,
}

impl EventText {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
