//! Logging and tracing configuration
//!
//! Console output always goes to stderr so that generated policies written to
//! stdout-oriented tooling never interleave with diagnostics. An optional
//! daily rolling file receives the same events as JSON.

use std::io;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Error returned when the subscriber cannot be installed
pub type LoggingError = Box<dyn std::error::Error + Send + Sync>;

/// Default prefix of rolling log files
pub const DEFAULT_LOG_PREFIX: &str = "abac-policy-generator";

/// Console event layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// Single-line human readable events
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Daily rolling JSON log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogging {
    /// Directory the files are created in
    pub directory: PathBuf,
    /// File name prefix
    pub prefix: String,
}

/// Subscriber setup for a generator run
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Maximum level for this crate's events
    pub level: Level,
    /// Console layout
    pub console: ConsoleFormat,
    /// Colored console output
    pub ansi: bool,
    /// Emit span close events, i.e. pipeline stage durations
    pub stage_timings: bool,
    /// Rolling file output
    pub file: Option<FileLogging>,
    /// Filter directive overriding `level` and `RUST_LOG`
    pub directive: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            console: ConsoleFormat::Compact,
            ansi: true,
            stage_timings: false,
            file: None,
            directive: None,
        }
    }
}

/// Keeps the non-blocking writers flushing until dropped
#[derive(Debug)]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl LoggingConfig {
    /// Create a configuration at INFO level
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the command line verbosity flags
    ///
    /// `--debug` wins over `--verbose`; both turn on stage timings. Without
    /// either flag only warnings and errors are shown.
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        let level = match (verbose, debug) {
            (_, true) => Level::DEBUG,
            (true, false) => Level::INFO,
            (false, false) => Level::WARN,
        };
        Self { level, stage_timings: verbose || debug, ..Self::default() }
    }

    /// Set the level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Switch the console to JSON events
    pub fn json(mut self) -> Self {
        self.console = ConsoleFormat::Json;
        self
    }

    /// Also log to a daily rolling file
    pub fn with_file(mut self, directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.file = Some(FileLogging { directory: directory.into(), prefix: prefix.into() });
        self
    }

    /// Disable ANSI colors
    pub fn plain(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Use an explicit filter directive such as `abac_policy_generator::optimization=trace`
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.stage_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn build_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Some(directive) = &self.directive {
            return Ok(EnvFilter::try_new(directive)?);
        }
        let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", crate_target, self.level))))
    }

    /// Install the global subscriber
    ///
    /// The returned guard must be held for the lifetime of the program.
    pub fn init(self) -> Result<LoggingGuard, LoggingError> {
        let filter = self.build_filter()?;
        let mut guards = Vec::new();

        let (stderr, stderr_guard) = non_blocking(io::stderr());
        guards.push(stderr_guard);

        let console = match self.console {
            ConsoleFormat::Json => {
                fmt::layer().json().with_writer(stderr).with_span_events(self.span_events()).boxed()
            }
            ConsoleFormat::Compact => fmt::layer()
                .compact()
                .with_writer(stderr)
                .with_ansi(self.ansi)
                .with_span_events(self.span_events())
                .boxed(),
        };

        let file = self.file.as_ref().map(|file| {
            let (writer, guard) = non_blocking(rolling::daily(&file.directory, &file.prefix));
            guards.push(guard);
            fmt::layer().json().with_writer(writer).with_span_events(self.span_events()).boxed()
        });

        Registry::default().with(filter).with(console).with(file).try_init()?;

        debug!(config = ?self, "Logging initialized");
        Ok(LoggingGuard { _guards: guards })
    }

    /// Warnings only, no colors
    pub fn init_test() -> Result<LoggingGuard, LoggingError> {
        Self::new().with_level(Level::WARN).plain().init()
    }
}

/// Structured event tagged with the pipeline stage that emitted it
#[macro_export]
macro_rules! policy_event {
    ($level:ident, $stage:expr, $message:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::$level!(
            message = $message,
            stage = $stage,
            $($key = $value,)*
        );
    };
    ($level:ident, $stage:expr, $message:expr) => {
        tracing::$level!(
            message = $message,
            stage = $stage,
        );
    };
}

/// Span around a timed pipeline stage
#[macro_export]
macro_rules! perf_span {
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info_span!(
            $name,
            component = "performance",
            $($key = $value,)*
        )
    };
    ($name:expr) => {
        tracing::info_span!(
            $name,
            component = "performance",
        )
    };
}
