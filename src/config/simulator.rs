// src/config/simulator.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "SIMULATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/simulator.toml";

fn default_city_code() -> String {
    "ATX".to_string()
}
fn default_max_active_calls() -> i64 {
    -1
}
fn default_true() -> bool {
    true
}
fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}
fn default_records_topic() -> String {
    "call-records".to_string()
}
fn default_alerts_topic() -> String {
    "dropped-alerts".to_string()
}
fn default_emit_interval_ms() -> u64 {
    1_000
}
fn default_emit_initial_delay_ms() -> u64 {
    5_000
}
fn default_end_calls_interval_ms() -> u64 {
    3_000
}
fn default_end_calls_initial_delay_ms() -> u64 {
    10_000
}
fn default_calls_ended_per_tick() -> u32 {
    3
}
fn default_forward_max_in_flight() -> usize {
    100
}
fn default_forward_timeout_ms() -> u64 {
    30_000
}
fn default_window_shards() -> usize {
    4
}
fn default_alert_webhook_timeout_secs() -> u64 {
    5
}
fn default_alert_webhook_retries() -> u8 {
    3
}
fn default_store_table() -> String {
    "call_records".to_string()
}

/// Process configuration: defaults ← TOML file ← environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_city_code")]
    pub city_code: String,
    /// `<= 0` means unbounded.
    #[serde(default = "default_max_active_calls")]
    pub max_active_calls: i64,
    #[serde(default)]
    pub initial_drop_rate: f64,
    #[serde(default = "default_true")]
    pub emitter_enabled: bool,

    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_records_topic")]
    pub records_topic: String,
    #[serde(default = "default_alerts_topic")]
    pub alerts_topic: String,

    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: u64,
    #[serde(default = "default_emit_initial_delay_ms")]
    pub emit_initial_delay_ms: u64,
    #[serde(default = "default_end_calls_interval_ms")]
    pub end_calls_interval_ms: u64,
    #[serde(default = "default_end_calls_initial_delay_ms")]
    pub end_calls_initial_delay_ms: u64,
    #[serde(default = "default_calls_ended_per_tick")]
    pub calls_ended_per_tick: u32,

    #[serde(default = "default_forward_max_in_flight")]
    pub forward_max_in_flight: usize,
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
    #[serde(default = "default_window_shards")]
    pub window_shards: usize,

    #[serde(default)]
    pub store_url: Option<String>,
    #[serde(default)]
    pub store_api_key: Option<String>,
    #[serde(default = "default_store_table")]
    pub store_table: String,
    #[serde(default)]
    pub alert_webhook_url: Option<String>,
    #[serde(default = "default_alert_webhook_timeout_secs")]
    pub alert_webhook_timeout_secs: u64,
    /// Total attempts per alert.
    #[serde(default = "default_alert_webhook_retries")]
    pub alert_webhook_retries: u8,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            city_code: default_city_code(),
            max_active_calls: default_max_active_calls(),
            initial_drop_rate: 0.0,
            emitter_enabled: true,
            bootstrap_servers: default_bootstrap_servers(),
            records_topic: default_records_topic(),
            alerts_topic: default_alerts_topic(),
            emit_interval_ms: default_emit_interval_ms(),
            emit_initial_delay_ms: default_emit_initial_delay_ms(),
            end_calls_interval_ms: default_end_calls_interval_ms(),
            end_calls_initial_delay_ms: default_end_calls_initial_delay_ms(),
            calls_ended_per_tick: default_calls_ended_per_tick(),
            forward_max_in_flight: default_forward_max_in_flight(),
            forward_timeout_ms: default_forward_timeout_ms(),
            window_shards: default_window_shards(),
            store_url: None,
            store_api_key: None,
            store_table: default_store_table(),
            alert_webhook_url: None,
            alert_webhook_timeout_secs: default_alert_webhook_timeout_secs(),
            alert_webhook_retries: default_alert_webhook_retries(),
        }
    }
}

impl SimulatorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading simulator config from {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Resolve the config file, then apply env overrides:
    /// 1) $SIMULATOR_CONFIG_PATH (must exist)
    /// 2) config/simulator.toml if present
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(PathBuf::from(p))?,
            Err(_) => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CITY_CODE") {
            self.city_code = v;
        }
        override_parsed("MAX_ACTIVE_CALLS", &mut self.max_active_calls);
        override_parsed("INITIAL_DROP_RATE", &mut self.initial_drop_rate);
        override_parsed("EMITTER_ENABLED", &mut self.emitter_enabled);

        override_string("KAFKA_BOOTSTRAP_SERVERS", &mut self.bootstrap_servers);
        override_string("CALL_RECORDS_TOPIC", &mut self.records_topic);
        override_string("DROPPED_ALERTS_TOPIC", &mut self.alerts_topic);

        override_parsed("EMIT_INTERVAL_MS", &mut self.emit_interval_ms);
        override_parsed("EMIT_INITIAL_DELAY_MS", &mut self.emit_initial_delay_ms);
        override_parsed("END_CALLS_INTERVAL_MS", &mut self.end_calls_interval_ms);
        override_parsed("END_CALLS_INITIAL_DELAY_MS", &mut self.end_calls_initial_delay_ms);
        override_parsed("CALLS_ENDED_PER_TICK", &mut self.calls_ended_per_tick);

        override_parsed("FORWARD_MAX_IN_FLIGHT", &mut self.forward_max_in_flight);
        override_parsed("FORWARD_TIMEOUT_MS", &mut self.forward_timeout_ms);
        override_parsed("WINDOW_SHARDS", &mut self.window_shards);

        override_optional("STORE_URL", &mut self.store_url);
        override_optional("STORE_API_KEY", &mut self.store_api_key);
        override_string("STORE_TABLE", &mut self.store_table);
        override_optional("ALERT_WEBHOOK_URL", &mut self.alert_webhook_url);
        override_parsed("ALERT_WEBHOOK_TIMEOUT_SECS", &mut self.alert_webhook_timeout_secs);
        override_parsed("ALERT_WEBHOOK_RETRIES", &mut self.alert_webhook_retries);
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms.max(1))
    }

    pub fn emit_initial_delay(&self) -> Duration {
        Duration::from_millis(self.emit_initial_delay_ms)
    }

    pub fn end_calls_interval(&self) -> Duration {
        Duration::from_millis(self.end_calls_interval_ms.max(1))
    }

    pub fn end_calls_initial_delay(&self) -> Duration {
        Duration::from_millis(self.end_calls_initial_delay_ms)
    }

    /// Never zero; a zero deadline would time out every pending request.
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms.max(1))
    }
}

fn override_parsed<T: FromStr>(name: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(env = name, value = %raw, "ignoring unparseable env override"),
    }
}

fn override_string(name: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(name) {
        if !v.trim().is_empty() {
            *slot = v.trim().to_string();
        }
    }
}

fn override_optional(name: &str, slot: &mut Option<String>) {
    if let Ok(v) = std::env::var(name) {
        let v = v.trim();
        *slot = (!v.is_empty()).then(|| v.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    const TOUCHED: &[&str] = &[
        ENV_CONFIG_PATH,
        "CITY_CODE",
        "MAX_ACTIVE_CALLS",
        "FORWARD_MAX_IN_FLIGHT",
        "STORE_URL",
        "ALERT_WEBHOOK_RETRIES",
    ];

    fn clear_env() {
        for k in TOUCHED {
            env::remove_var(k);
        }
    }

    #[test]
    fn empty_file_equals_defaults() {
        let parsed: SimulatorConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, SimulatorConfig::default());
    }

    #[test]
    fn defaults_match_simulator_schedule() {
        let cfg = SimulatorConfig::default();
        assert_eq!(cfg.city_code, "ATX");
        assert_eq!(cfg.max_active_calls, -1);
        assert_eq!(cfg.emit_interval(), Duration::from_secs(1));
        assert_eq!(cfg.emit_initial_delay(), Duration::from_secs(5));
        assert_eq!(cfg.end_calls_interval(), Duration::from_secs(3));
        assert_eq!(cfg.end_calls_initial_delay(), Duration::from_secs(10));
        assert_eq!(cfg.calls_ended_per_tick, 3);
        assert_eq!(cfg.forward_max_in_flight, 100);
        assert_eq!(cfg.forward_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.records_topic, "call-records");
        assert_eq!(cfg.alerts_topic, "dropped-alerts");
        assert!(cfg.emitter_enabled);
        assert!(cfg.store_url.is_none());
        assert_eq!(cfg.alert_webhook_timeout_secs, 5);
        assert_eq!(cfg.alert_webhook_retries, 3);
    }

    #[test]
    fn zero_durations_are_clamped() {
        let cfg: SimulatorConfig =
            toml::from_str("forward_timeout_ms = 0\nemit_interval_ms = 0\n").unwrap();
        assert_eq!(cfg.forward_timeout(), Duration::from_millis(1));
        assert_eq!(cfg.emit_interval(), Duration::from_millis(1));
        // initial delays may be zero
        let cfg: SimulatorConfig = toml::from_str("emit_initial_delay_ms = 0").unwrap();
        assert_eq!(cfg.emit_initial_delay(), Duration::ZERO);
    }

    #[serial_test::serial]
    #[test]
    fn file_then_env_layering() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("sim.toml");
        fs::write(
            &p,
            "city_code = \"CHI\"\nmax_active_calls = 20\nforward_max_in_flight = 8\n",
        )
        .unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("MAX_ACTIVE_CALLS", "5");
        env::set_var("FORWARD_MAX_IN_FLIGHT", "not-a-number");
        env::set_var("STORE_URL", "  ");
        env::set_var("ALERT_WEBHOOK_RETRIES", "5");

        let cfg = SimulatorConfig::load().unwrap();
        assert_eq!(cfg.city_code, "CHI");
        assert_eq!(cfg.max_active_calls, 5);
        // bad override keeps the file value
        assert_eq!(cfg.forward_max_in_flight, 8);
        assert!(cfg.store_url.is_none());
        assert_eq!(cfg.alert_webhook_retries, 5);

        clear_env();
    }

    #[test]
    fn shipped_example_parses_to_defaults() {
        let cfg = SimulatorConfig::load_from_file("config/simulator.example.toml").unwrap();
        assert_eq!(cfg, SimulatorConfig::default());
    }

    #[serial_test::serial]
    #[test]
    fn missing_explicit_path_is_an_error() {
        clear_env();
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        assert!(SimulatorConfig::load().is_err());
        clear_env();
    }
}
