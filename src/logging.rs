// src/logging.rs
//! Tracing setup. `RUST_LOG` controls filtering (default
//! `cell_drop_monitor=info,warn`); `LOG_FORMAT=json` switches to JSON lines.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_FILTER: &str = "cell_drop_monitor=info,warn";

/// Install the global subscriber. Returns `false` (and logs through whatever
/// subscriber is already installed) when another one was set first, in which
/// case `LOG_FORMAT` and the default filter have no effect.
pub fn init_tracing() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // the deployment runtime may already have installed a subscriber
    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    match installed {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                json,
                "global subscriber already set ({e}); LOG_FORMAT and the default filter are not applied"
            );
            false
        }
    }
}
