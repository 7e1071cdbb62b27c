//! Structured logging setup. The embedding process calls [`init`] once at
//! startup; services themselves only use the `tracing` macros.

use std::env;

/// Initializes tracing using the provided log level as the default filter.
/// `RUST_LOG` takes precedence when set and non-empty.
pub fn init(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storeops_api={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new("storeops_api=info"));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init();
    }
}
