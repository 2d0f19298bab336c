//! # Call Records
//! The immutable per-call event flowing through the pipeline, plus its wire
//! JSON shape (`cell_id`, `lat`, `lng`, `signal_strength`, `is_dropped`,
//! `timestamp`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One call event reported by a cell tower.
///
/// `cell_id` is the partition key for windowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub cell_id: String,
    pub lat: f64,
    pub lng: f64,
    pub signal_strength: i32,
    pub is_dropped: bool,
    /// RFC 3339 UTC. Older producers omit it.
    #[serde(default)]
    pub timestamp: String,
}

impl CallEvent {
    /// Coordinates as `(lat, lng)`.
    pub fn coordinates(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }

    pub fn key(&self) -> &str {
        &self.cell_id
    }

    /// Parse an inbound wire record.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw.trim()).with_context(|| format!("parse call record: {raw}"))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize call record")
    }
}
