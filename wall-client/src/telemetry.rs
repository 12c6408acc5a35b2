//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "wall_client=info,wall_cache=info,warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `filter`. Returns `false` when a
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(filter: Option<&str>, json: bool) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_LOG_FILTER)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(json, "tracing initialized");
            true
        }
        Err(_) => false,
    }
}
