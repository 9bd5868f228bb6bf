//! Tracing subscriber setup.

use crate::config::LoggingSettings;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling twice is a no-op.
#[cfg(feature = "tracing")]
pub fn init(settings: &LoggingSettings) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_lowercase()));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match settings.format.to_lowercase().as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn init(_settings: &LoggingSettings) {}
