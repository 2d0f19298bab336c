//! Alert records emitted when a cell's window advances.

use serde::{Serialize, Serializer};

use crate::window::DropCounts;

/// Finalized window result for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub cell_id: String,
    #[serde(rename = "dropRate", serialize_with = "two_decimals")]
    pub drop_rate: f64,
    #[serde(rename = "windowSize")]
    pub window_size: u64,
}

impl AlertRecord {
    /// Build a record from full-window counts. Returns `None` on empty counts.
    pub fn from_counts(cell_id: &str, counts: DropCounts) -> Option<Self> {
        let drop_rate = counts.drop_rate()?;
        Some(Self {
            cell_id: cell_id.to_string(),
            drop_rate,
            window_size: counts.total,
        })
    }

    /// Drop rate rounded to the 2-decimal output precision.
    pub fn rounded_drop_rate(&self) -> f64 {
        round2(self.drop_rate)
    }

    /// Wire line, e.g. `{"cell_id":"ATX","dropRate":0.10,"windowSize":30}`.
    pub fn to_json_line(&self) -> String {
        let cell = serde_json::to_string(&self.cell_id).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            "{{\"cell_id\":{},\"dropRate\":{:.2},\"windowSize\":{}}}",
            cell, self.drop_rate, self.window_size
        )
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn two_decimals<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round2(*v))
}
