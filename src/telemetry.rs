//! Structured logging setup.
//!
//! The router logs through `tracing` everywhere (route table load, match
//! attempts, handler execution, failures); this module installs a subscriber
//! for hosts that do not bring their own. Configuration comes from
//! `SIMPLEAPI_LOG_*` environment variables:
//!
//! | Variable                        | Default   | Values                         |
//! |---------------------------------|-----------|--------------------------------|
//! | `SIMPLEAPI_LOG_LEVEL`           | `info`    | trace/debug/info/warn/error    |
//! | `SIMPLEAPI_LOG_FORMAT`          | `json`    | json/pretty                    |
//! | `SIMPLEAPI_LOG_SAMPLING_MODE`   | `all`     | all/error-only/sampled         |
//! | `SIMPLEAPI_LOG_SAMPLING_RATE`   | `1.0`     | 0.0-1.0                        |
//! | `SIMPLEAPI_LOG_ASYNC`           | `false`   | true/false                     |
//! | `SIMPLEAPI_LOG_TARGET_FILTER`   | unset     | comma separated directives     |
//! | `SIMPLEAPI_LOG_INCLUDE_LOCATION`| `false`   | true/false                     |
//!
//! `RUST_LOG` takes precedence over `SIMPLEAPI_LOG_LEVEL` when set.

use anyhow::{Context, Result};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::subscriber::Interest;
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Which events reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Everything that passes the level filter
    All,
    /// Only WARN and ERROR
    ErrorOnly,
    /// Every WARN and ERROR, a fraction of the rest
    Sampled,
}

impl SamplingMode {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    /// Fraction of non-error events kept in `Sampled` mode
    pub sampling_rate: f64,
    /// Write through a background worker thread
    pub async_logging: bool,
    /// Extra filter directives, comma separated (e.g. `simpleapi::router=debug`)
    pub target_filter: Option<String>,
    /// Include file:line in every event
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read the configuration from `SIMPLEAPI_LOG_*`, falling back to
    /// [`Default`] for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: env::var("SIMPLEAPI_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: env::var("SIMPLEAPI_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            sampling_mode: env::var("SIMPLEAPI_LOG_SAMPLING_MODE")
                .map(|s| SamplingMode::parse(&s))
                .unwrap_or(defaults.sampling_mode),
            sampling_rate: env_parse("SIMPLEAPI_LOG_SAMPLING_RATE")
                .unwrap_or(defaults.sampling_rate),
            async_logging: env_parse("SIMPLEAPI_LOG_ASYNC").unwrap_or(defaults.async_logging),
            target_filter: env::var("SIMPLEAPI_LOG_TARGET_FILTER").ok(),
            include_location: env_parse("SIMPLEAPI_LOG_INCLUDE_LOCATION")
                .unwrap_or(defaults.include_location),
        }
    }

    /// Verbose, human readable output for local development
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Sampling layer: decides whether an event is emitted
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    #[must_use]
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let is_problem = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => is_problem,
            SamplingMode::Sampled => {
                if is_problem {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                let interval = (1.0 / self.sampling_rate).round().max(1.0) as u64;
                count % interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        match self.mode {
            // decided per event, never cached on the callsite
            SamplingMode::Sampled => Interest::sometimes(),
            SamplingMode::All | SamplingMode::ErrorOnly => {
                if self.should_sample(metadata) {
                    Interest::always()
                } else {
                    Interest::never()
                }
            }
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.should_sample(metadata)
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if let Some(target_filter) = &config.target_filter {
        for directive in target_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse::<Directive>() {
                Ok(d) => filter = filter.add_directive(d),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
            }
        }
    }
    filter
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard owns the background writer; keep
/// it alive until shutdown or buffered events are lost.
///
/// # Errors
///
/// Fails when a global subscriber is already installed (including a second
/// call to this function).
///
/// # Example
///
/// ```no_run
/// use simpleapi::telemetry::{init_logging_with_config, LogConfig};
///
/// let _guard = init_logging_with_config(&LogConfig::from_env())?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    // the level filter is consulted first so only surviving events advance
    // the sampling counter
    let registry = tracing_subscriber::registry()
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate))
        .with(build_filter(config));

    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// [`init_logging_with_config`] with [`LogConfig::from_env`].
///
/// # Errors
///
/// See [`init_logging_with_config`].
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    init_logging_with_config(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Counts the events that reach the end of the layer stack.
    #[derive(Clone, Default)]
    struct EventCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for EventCounter {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Run `emit` under a registry stacked like `init_logging_with_config`
    /// and return how many events were delivered.
    fn delivered(sampling: SamplingLayer, emit: impl FnOnce()) -> usize {
        let counter = EventCounter::default();
        let subscriber = tracing_subscriber::registry()
            .with(sampling)
            .with(EnvFilter::new("info"))
            .with(counter.clone());
        tracing::subscriber::with_default(subscriber, emit);
        counter.0.load(Ordering::SeqCst)
    }

    struct TestCallsite;
    impl tracing::callsite::Callsite for TestCallsite {
        fn set_interest(&self, _interest: tracing::subscriber::Interest) {}
        fn metadata(&self) -> &Metadata<'_> {
            unimplemented!("not used in tests")
        }
    }
    static CALLSITE: TestCallsite = TestCallsite;

    fn metadata(level: Level) -> Metadata<'static> {
        Metadata::new(
            "test",
            "simpleapi::test",
            level,
            None,
            None,
            None,
            tracing::field::FieldSet::new(&[], tracing::callsite::Identifier(&CALLSITE)),
            tracing::metadata::Kind::EVENT,
        )
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("bogus"), LogFormat::Json);
        assert_eq!(SamplingMode::parse("error_only"), SamplingMode::ErrorOnly);
        assert_eq!(SamplingMode::parse("Sampled"), SamplingMode::Sampled);
        assert_eq!(SamplingMode::parse("bogus"), SamplingMode::All);
    }

    #[test]
    fn test_default_dev() {
        let config = LogConfig::default_dev();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.include_location);
        assert_eq!(config.sampling_mode, SamplingMode::All);
    }

    #[test]
    fn test_error_only_mode() {
        let layer = SamplingLayer::new(SamplingMode::ErrorOnly, 1.0);
        assert!(!layer.should_sample(&metadata(Level::INFO)));
        assert!(layer.should_sample(&metadata(Level::WARN)));
        assert!(layer.should_sample(&metadata(Level::ERROR)));
    }

    #[test]
    fn test_sampled_mode_keeps_errors_and_thins_the_rest() {
        let layer = SamplingLayer::new(SamplingMode::Sampled, 0.25);
        let kept = (0..100)
            .filter(|_| layer.should_sample(&metadata(Level::INFO)))
            .count();
        assert_eq!(kept, 25);
        assert!((0..10).all(|_| layer.should_sample(&metadata(Level::ERROR))));
    }

    #[test]
    fn test_sampled_mode_thins_one_callsite_through_subscriber() {
        let n = delivered(SamplingLayer::new(SamplingMode::Sampled, 0.5), || {
            for i in 0..10 {
                tracing::info!(i, "tick");
            }
        });
        assert_eq!(n, 5);
    }

    #[test]
    fn test_sampled_mode_counts_only_events_passing_the_level_filter() {
        let n = delivered(SamplingLayer::new(SamplingMode::Sampled, 0.5), || {
            for i in 0..10 {
                tracing::debug!(i, "below the filter");
                tracing::info!(i, "tick");
                tracing::warn!(i, "always kept");
            }
        });
        assert_eq!(n, 5 + 10);
    }

    #[test]
    fn test_error_only_mode_through_subscriber() {
        let n = delivered(SamplingLayer::new(SamplingMode::ErrorOnly, 1.0), || {
            for _ in 0..3 {
                tracing::info!("dropped");
                tracing::error!("kept");
            }
        });
        assert_eq!(n, 3);
    }

    #[test]
    fn test_zero_rate_drops_non_errors() {
        let layer = SamplingLayer::new(SamplingMode::Sampled, -1.0);
        assert_eq!(layer.sampling_rate, 0.0);
        assert!(!layer.should_sample(&metadata(Level::DEBUG)));
        assert!(layer.should_sample(&metadata(Level::WARN)));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig {
            log_level: "error".to_string(),
            ..LogConfig::default()
        };
        let _first = init_logging_with_config(&config);
        assert!(init_logging_with_config(&config).is_err());
    }
}
