//! Tracing subscriber setup for buildmatrix binaries.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise everything at
/// `level` and above is logged. With `json` the subscriber emits
/// newline-delimited JSON log lines for machine consumption; the
/// human-readable form is the compact single-line format. Calling this
/// more than once is harmless: only the first call installs a
/// subscriber.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("buildmatrix={level},warn")));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(false).with_current_span(false))
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().compact().with_target(false))
            .try_init()
            .ok();
    }
}
