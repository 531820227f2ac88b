//----------------------------------------------------------------------------------------- std lib
use std::io::Write;
use std::time::Instant;
//--------------------------------------------------------------------------------- other libraries
use log::info;
use once_cell::sync::Lazy;
use tracing_subscriber::{EnvFilter, Layer as _, fmt::format::FmtSpan, layer::SubscriberExt as _};

// This will get initialized below.
/// Returns the init [`Instant`]
pub static INIT_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

/// The filter used when `RUST_LOG` isn't set: everything but playlake's own crates is silenced.
fn default_filter(filter: log::LevelFilter) -> String {
    format!("off,playlake={filter}")
}

//---------------------------------------------------------------------------------------------------- Logger init function
#[allow(clippy::module_name_repetitions)]
/// Initializes the logger.
///
/// This enables console logging on all the internals of `Playlake`.
///
/// Functionality is provided by [`log`].
///
/// The levels are:
/// - ERROR
/// - WARN
/// - INFO
/// - DEBUG
/// - TRACE
///
/// # Panics
/// This must only be called _once_.
#[cfg(not(tarpaulin_include))]
pub fn init_logger(filter: log::LevelFilter) {
    use crate::format_duration;

    // Initialize timer.
    let now = Lazy::force(&INIT_INSTANT);

    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let mut builder = env_logger::Builder::new();
    if env.is_empty() {
        builder.parse_filters(&default_filter(filter));
    } else {
        builder.parse_filters(&env);
    }

    builder
        .format(move |buf, record| {
            let style = buf.default_level_style(record.level());
            let level = match record.level() {
                log::Level::Debug => "D",
                log::Level::Trace => "T",
                log::Level::Info => "I",
                log::Level::Warn => "W",
                log::Level::Error => "E",
            };
            writeln!(
                buf,
                // Longest PATH in the repo: `storage/src/writer/partition.rs` - `31` characters
                // Longest file in the repo: `storage/src/writer/parquet.rs`   - `3` digits
                //
                //      Longest PATH ---|        |--- Longest file
                //                      |        |
                //                      v        v
                "| {style}{level}{style:#} | {} | {: >31} @ {: <3} | {}",
                format_duration(&now.elapsed()),
                record.file_static().unwrap_or("???"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .write_style(env_logger::WriteStyle::Auto)
        .init();

    if env.is_empty() {
        info!("Log Level (Flag) ... {filter}");
    } else {
        info!("Log Level (RUST_LOG) ... {env}");
    }
}

/// Initializes the tracing layer.
///
/// When `trace_spans` is set, the close of every instrumented span (i.e. every pipeline
/// stage) is reported on stderr along with how long it took.
/// `PLAYLAKE_TRACE` overrides which spans are reported, using the `RUST_LOG` syntax.
#[must_use]
pub fn init_tracing(trace_spans: bool) -> impl tracing::Subscriber + Send + Sync {
    #[cfg(not(feature = "verbose_tracing"))]
    let default = "off,playlake=trace";
    #[cfg(feature = "verbose_tracing")]
    let default = "trace";

    let filter = EnvFilter::try_from_env("PLAYLAKE_TRACE").unwrap_or_else(|_| EnvFilter::new(default));

    let spans = trace_spans.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
    });

    tracing_subscriber::registry().with(spans.with_filter(filter))
}
