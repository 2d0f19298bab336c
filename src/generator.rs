// src/generator.rs
//! Synthetic call records for a configured city.

use chrono::{SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::CallEvent;

/// Signal strength range in dBm (inclusive).
pub const SIGNAL_MIN_DBM: i32 = -110;
pub const SIGNAL_MAX_DBM: i32 = -65;

/// Known tower locations. Unknown codes fall back to Austin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum City {
    Austin,
    Chicago,
    NewYork,
}

impl City {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "CHI" => City::Chicago,
            "NYC" => City::NewYork,
            _ => City::Austin,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            City::Austin => "ATX",
            City::Chicago => "CHI",
            City::NewYork => "NYC",
        }
    }

    /// `(lat, lng)`
    pub fn coordinates(&self) -> (f64, f64) {
        match self {
            City::Austin => (30.2672, -97.7431),
            City::Chicago => (41.8781, -87.6298),
            City::NewYork => (40.7128, -74.0060),
        }
    }
}

pub struct CallRecordGenerator {
    city: City,
    rng: StdRng,
}

impl CallRecordGenerator {
    pub fn new(city_code: &str) -> Self {
        Self::with_rng(city_code, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and replays.
    pub fn seeded(city_code: &str, seed: u64) -> Self {
        Self::with_rng(city_code, StdRng::seed_from_u64(seed))
    }

    fn with_rng(city_code: &str, rng: StdRng) -> Self {
        let city = City::from_code(city_code);
        if city.code() != city_code.trim().to_ascii_uppercase() {
            tracing::warn!(target: "emitter", city_code, fallback = city.code(), "unknown city code; using default location");
        }
        Self { city, rng }
    }

    pub fn city(&self) -> City {
        self.city
    }

    /// `true` with probability `drop_rate`. Values outside `[0,1]` saturate.
    pub fn draw_dropped(&mut self, drop_rate: f64) -> bool {
        self.rng.random::<f64>() < drop_rate
    }

    pub fn next_record(&mut self, is_dropped: bool) -> CallEvent {
        let (lat, lng) = self.city.coordinates();
        CallEvent {
            cell_id: self.city.code().to_string(),
            lat,
            lng,
            signal_strength: self.rng.random_range(SIGNAL_MIN_DBM..=SIGNAL_MAX_DBM),
            is_dropped,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_lookup_is_case_insensitive_with_fallback() {
        assert_eq!(City::from_code("chi"), City::Chicago);
        assert_eq!(City::from_code("NYC"), City::NewYork);
        assert_eq!(City::from_code("LAX"), City::Austin);
        assert_eq!(City::from_code(""), City::Austin);
    }

    #[test]
    fn records_carry_city_location_and_signal_range() {
        let mut g = CallRecordGenerator::seeded("nyc", 7);
        for _ in 0..200 {
            let r = g.next_record(false);
            assert_eq!(r.cell_id, "NYC");
            assert_eq!(r.coordinates(), (40.7128, -74.0060));
            assert!((SIGNAL_MIN_DBM..=SIGNAL_MAX_DBM).contains(&r.signal_strength));
            assert!(r.timestamp.ends_with('Z'));
        }
    }

    #[test]
    fn drop_draw_respects_extremes() {
        let mut g = CallRecordGenerator::seeded("ATX", 1);
        assert!((0..100).all(|_| !g.draw_dropped(0.0)));
        assert!((0..100).all(|_| g.draw_dropped(1.0)));
        assert!((0..100).all(|_| !g.draw_dropped(-3.0)));
        assert!((0..100).all(|_| g.draw_dropped(7.5)));
    }
}
