//! # Emission Controller
//! Periodic call simulation driven by two explicit tickers:
//!
//! - emission: one call record per tick, dropped at the configured probability
//!   or forced dropped while the active-call ceiling is reached; accepted calls
//!   are admitted into the `AdmissionCounter`.
//! - termination: ends up to `calls_ended_per_tick` active calls per tick.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::admission::AdmissionCounter;
use crate::config::SimulatorConfig;
use crate::control::ControlState;
use crate::generator::CallRecordGenerator;
use crate::pipeline::Pipeline;
use crate::record::CallEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionSchedule {
    pub emit_every: Duration,
    pub emit_delay: Duration,
    pub end_calls_every: Duration,
    pub end_calls_delay: Duration,
    pub calls_ended_per_tick: u32,
}

impl EmissionSchedule {
    pub fn from_config(cfg: &SimulatorConfig) -> Self {
        Self {
            emit_every: cfg.emit_interval(),
            emit_delay: cfg.emit_initial_delay(),
            end_calls_every: cfg.end_calls_interval(),
            end_calls_delay: cfg.end_calls_initial_delay(),
            calls_ended_per_tick: cfg.calls_ended_per_tick,
        }
    }
}

pub struct EmissionController {
    control: Arc<ControlState>,
    pipeline: Arc<Pipeline>,
    generator: CallRecordGenerator,
}

impl EmissionController {
    pub fn new(
        control: Arc<ControlState>,
        pipeline: Arc<Pipeline>,
        generator: CallRecordGenerator,
    ) -> Self {
        Self {
            control,
            pipeline,
            generator,
        }
    }

    /// One emission tick. Returns the emitted record, or `None` while disabled.
    pub async fn emit_once(&mut self) -> Option<CallEvent> {
        if !self.control.emitter_enabled() {
            return None;
        }

        let admission = self.control.admission();
        let mut is_dropped = self.generator.draw_dropped(self.control.drop_rate());
        let mut forced = false;
        if !is_dropped && !admission.try_admit() {
            is_dropped = true;
            forced = true;
        } else if is_dropped && admission.is_at_ceiling() {
            forced = true;
        }

        if forced {
            counter!("calls_forced_drop_total").increment(1);
            tracing::info!(
                target: "emitter",
                max_active_calls = admission.ceiling(),
                "max active calls reached; dropping call"
            );
        }

        let record = self.generator.next_record(is_dropped);
        self.pipeline.dispatch(record.clone()).await;

        counter!("calls_emitted_total").increment(1);
        if is_dropped {
            counter!("calls_dropped_total").increment(1);
        }
        gauge!("active_calls").set(admission.get() as f64);

        tracing::debug!(
            target: "emitter",
            cell_id = %record.cell_id,
            is_dropped,
            active = admission.get(),
            max = admission.ceiling(),
            "emitted call record"
        );
        Some(record)
    }

    /// One termination tick.
    pub fn end_calls_once(&self, max: u32) -> u32 {
        end_calls(self.control.admission(), max)
    }
}

/// End up to `max` active calls; never goes below zero. Returns how many ended.
pub fn end_calls(admission: &AdmissionCounter, max: u32) -> u32 {
    let mut ended = 0;
    for _ in 0..max {
        if !admission.decrement() {
            break;
        }
        ended += 1;
    }
    if ended > 0 {
        counter!("calls_ended_total").increment(ended as u64);
        gauge!("active_calls").set(admission.get() as f64);
        tracing::info!(target: "emitter", ended, active = admission.get(), "calls ended");
    }
    ended
}

pub struct EmissionTasks {
    pub emit: JoinHandle<()>,
    pub end_calls: JoinHandle<()>,
}

impl EmissionTasks {
    pub fn abort(&self) {
        self.emit.abort();
        self.end_calls.abort();
    }
}

/// Spawn the emission and termination tickers.
pub fn spawn_emission_tasks(
    mut controller: EmissionController,
    schedule: EmissionSchedule,
) -> EmissionTasks {
    let admission = controller.control.admission().clone();
    let min_period = Duration::from_millis(1);

    let emit = tokio::spawn(async move {
        let mut ticker = interval_at(
            Instant::now() + schedule.emit_delay,
            schedule.emit_every.max(min_period),
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            controller.emit_once().await;
        }
    });

    let terminate = tokio::spawn(async move {
        let mut ticker = interval_at(
            Instant::now() + schedule.end_calls_delay,
            schedule.end_calls_every.max(min_period),
        );
        loop {
            ticker.tick().await;
            end_calls(&admission, schedule.calls_ended_per_tick);
        }
    });

    EmissionTasks {
        emit,
        end_calls: terminate,
    }
}
