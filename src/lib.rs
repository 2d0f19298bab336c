// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod admission;
pub mod alert;
pub mod api;
pub mod config;
pub mod control;
pub mod emitter;
pub mod engine;
pub mod forwarder;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod transport;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::admission::AdmissionCounter;
pub use crate::alert::AlertRecord;
pub use crate::api::router;
pub use crate::config::SimulatorConfig;
pub use crate::control::{ControlSnapshot, ControlState};
pub use crate::engine::{KeyedWindowEngine, WindowShards};
pub use crate::forwarder::{BoundedForwarder, ForwardOutcome, ForwardResult};
pub use crate::record::CallEvent;
pub use crate::window::{DropCounts, WindowAccumulator, WINDOW_SIZE};

use std::sync::Arc;

use tracing::info;

use crate::emitter::{spawn_emission_tasks, EmissionController, EmissionSchedule, EmissionTasks};
use crate::generator::CallRecordGenerator;
use crate::pipeline::Pipeline;

/// Everything the running service owns.
pub struct Service {
    pub control: Arc<ControlState>,
    pub pipeline: Arc<Pipeline>,
    pub tasks: EmissionTasks,
}

impl Service {
    /// Stop both tickers, then flush pending alerts and forwards.
    pub async fn shutdown(&self) {
        self.tasks.abort();
        self.pipeline.shutdown().await;
        info!("call record emitter stopped");
    }
}

/// Build shared state from `cfg`, spawn the window shards and both tickers.
/// Must be called inside a tokio runtime.
pub fn start(cfg: &SimulatorConfig) -> Service {
    let admission = Arc::new(AdmissionCounter::new(cfg.max_active_calls));
    let control = Arc::new(ControlState::new(
        cfg.initial_drop_rate,
        cfg.emitter_enabled,
        admission,
    ));
    let pipeline = Arc::new(Pipeline::from_config(cfg));

    info!("-----------------------------");
    info!("Starting Call Record Emitter");
    info!(
        drop_rate = control.drop_rate(),
        max_active_calls = cfg.max_active_calls,
        bootstrap_servers = %cfg.bootstrap_servers,
        topic = %cfg.records_topic,
        city = %cfg.city_code,
        "emitter configuration"
    );

    let controller = EmissionController::new(
        control.clone(),
        pipeline.clone(),
        CallRecordGenerator::new(&cfg.city_code),
    );
    let tasks = spawn_emission_tasks(controller, EmissionSchedule::from_config(cfg));

    Service {
        control,
        pipeline,
        tasks,
    }
}
