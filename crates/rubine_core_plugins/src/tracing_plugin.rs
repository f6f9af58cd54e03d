//! Logging plugin.
//!
//! [`TracingPlugin`] installs a `tracing` subscriber during `ready()`, so
//! any plugin built before it can still change the configuration. Every
//! Rubine crate logs through `tracing`; without a subscriber the events are
//! simply dropped.
//!
//! # Example
//!
//! ```
//! use rubine_app::App;
//! use rubine_core_plugins::{TracingFormat, TracingPlugin};
//! use tracing::Level;
//!
//! let mut app = App::<f64>::new();
//! app.add_plugins(
//!     TracingPlugin::default()
//!         .with_level(Level::DEBUG)
//!         .with_format(TracingFormat::Compact)
//!         .with_env_filter("rubine_scheduler=trace,rubine_abstractions=debug"),
//! );
//! app.finish()?;
//! # Ok::<(), rubine_app::AppError>(())
//! ```

use rubine_app::{App, AppError, Plugin};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable multi-line output (default).
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// JSON lines for log aggregation.
    Json,
}

/// Installs the global `tracing` subscriber.
///
/// Installation is skipped silently when a subscriber already exists, so
/// several apps (or tests) in one process can all carry the plugin.
#[derive(Debug, Clone)]
pub struct TracingPlugin {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPlugin {
    /// Creates the plugin with `INFO` level and pretty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum level, used when no filter string is given or the
    /// filter string is invalid.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a per-target filter, e.g. `rubine_scheduler=trace,rubine_app=info`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Emits span enter/exit events.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|err| {
                tracing::warn!(%filter, error = %err, "invalid tracing filter, using level");
                EnvFilter::new(self.level.as_str())
            }),
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }

    /// Installs the subscriber. Returns false if one was already installed.
    fn install(&self) -> bool {
        let registry = tracing_subscriber::registry().with(self.env_filter());
        let span_events = self.span_events();
        let installed = match self.format {
            TracingFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init(),
        };
        installed.is_ok()
    }
}

impl<A: 'static> Plugin<A> for TracingPlugin {
    fn build(&self, _app: &mut App<A>) -> Result<(), AppError> {
        Ok(())
    }

    fn ready(&self, _app: &mut App<A>) {
        let installed = self.install();
        tracing::info!(
            level = %self.level,
            format = ?self.format,
            installed,
            "tracing initialized"
        );
    }

    fn cleanup(&self, _app: &mut App<A>) {
        tracing::info!("tracing shutting down");
    }
}
