//! Runtime knobs shared by the emitter and the control API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::admission::AdmissionCounter;

#[derive(Debug)]
pub struct ControlState {
    /// f64 bits
    drop_rate: AtomicU64,
    emitter_enabled: AtomicBool,
    admission: Arc<AdmissionCounter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSnapshot {
    pub drop_rate: f64,
    pub emitter_enabled: bool,
    pub active_call_count: u64,
    pub max_active_calls: i64,
}

impl ControlState {
    pub fn new(drop_rate: f64, emitter_enabled: bool, admission: Arc<AdmissionCounter>) -> Self {
        Self {
            drop_rate: AtomicU64::new(drop_rate.to_bits()),
            emitter_enabled: AtomicBool::new(emitter_enabled),
            admission,
        }
    }

    pub fn drop_rate(&self) -> f64 {
        f64::from_bits(self.drop_rate.load(Ordering::SeqCst))
    }

    /// Any value is accepted; outside `[0,1]` it just saturates the draw.
    pub fn set_drop_rate(&self, value: f64) {
        self.drop_rate.store(value.to_bits(), Ordering::SeqCst);
    }

    pub fn emitter_enabled(&self) -> bool {
        self.emitter_enabled.load(Ordering::SeqCst)
    }

    pub fn set_emitter_enabled(&self, enabled: bool) {
        self.emitter_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn admission(&self) -> &Arc<AdmissionCounter> {
        &self.admission
    }

    pub fn reset_active_calls(&self) {
        self.admission.reset();
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            drop_rate: self.drop_rate(),
            emitter_enabled: self.emitter_enabled(),
            active_call_count: self.admission.get(),
            max_active_calls: self.admission.ceiling(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() {
        let admission = Arc::new(AdmissionCounter::new(10));
        let control = ControlState::new(0.0, true, admission.clone());
        control.set_drop_rate(0.25);
        control.set_emitter_enabled(false);
        admission.increment();

        assert_eq!(
            control.snapshot(),
            ControlSnapshot {
                drop_rate: 0.25,
                emitter_enabled: false,
                active_call_count: 1,
                max_active_calls: 10,
            }
        );

        control.reset_active_calls();
        assert_eq!(control.snapshot().active_call_count, 0);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let control = ControlState::new(1.5, true, Arc::new(AdmissionCounter::unbounded()));
        let v = serde_json::to_value(control.snapshot()).unwrap();
        assert_eq!(v["dropRate"], 1.5);
        assert_eq!(v["emitterEnabled"], true);
        assert_eq!(v["activeCallCount"], 0);
        assert_eq!(v["maxActiveCalls"], -1);
    }
}
