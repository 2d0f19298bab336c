//! Cell Drop Monitor — Binary Entrypoint
//! Boots the emission tickers, window shards and forwarder, and serves the
//! control API.

use cell_drop_monitor::{api, logging, metrics::Metrics, SimulatorConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = SimulatorConfig::load()?;
    let metrics = Metrics::init()?;

    let service = cell_drop_monitor::start(&cfg);

    let router = api::router(api::AppState::new(service.control.clone())).merge(metrics.router());

    Ok(router.into())
}
