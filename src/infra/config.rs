//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Node identifier reported in status notices
    #[serde(default = "default_node_id")]
    pub id: String,
}

fn default_node_id() -> String {
    "acnode".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self { id: default_node_id() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicsConfig {
    /// Prefix the coordinator publishes commands/requests under
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Prefix this node publishes notices under
    #[serde(default = "default_notice_prefix")]
    pub notice_prefix: String,
}

fn default_command_prefix() -> String {
    "RPiServer".to_string()
}

fn default_notice_prefix() -> String {
    "arduino".to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            notice_prefix: default_notice_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorsConfig {
    /// Idle doorway reading with nothing in front of the sensor (cm)
    pub baseline_cm: f64,
    /// Margin below baseline before a reading counts as triggered (cm)
    pub margin_cm: f64,
    /// Echo wait cap per measurement
    pub echo_timeout_ms: u64,
    /// Control loop tick interval
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Distance reported by the simulated doorway sensors (cm)
    #[serde(default = "default_sim_distance_cm")]
    pub distance_cm: f64,
    /// Temperature reported by the simulated sensor (Celsius)
    #[serde(default = "default_sim_temperature_c")]
    pub temperature_c: f64,
}

fn default_sim_distance_cm() -> f64 {
    150.0
}

fn default_sim_temperature_c() -> f64 {
    24.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            distance_cm: default_sim_distance_cm(),
            temperature_c: default_sim_temperature_c(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: 60, prometheus_port: 0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Run an embedded broker instead of expecting an external one.
    /// Development convenience for running the node without a coordinator.
    #[serde(default)]
    pub embedded: bool,
    #[serde(default = "default_broker_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            embedded: false,
            bind_address: default_broker_bind_address(),
            port: default_broker_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    #[serde(default = "default_journal_dir")]
    pub dir: String,
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_dir() -> String {
    "logs".to_string()
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { enabled: default_journal_enabled(), dir: default_journal_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub node: NodeConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    node_id: String,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    command_prefix: String,
    notice_prefix: String,
    baseline_cm: f64,
    margin_cm: f64,
    echo_timeout_ms: u64,
    poll_interval_ms: u64,
    sim_distance_cm: f64,
    sim_temperature_c: f64,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    broker_embedded: bool,
    broker_bind_address: String,
    broker_port: u16,
    journal_enabled: bool,
    journal_dir: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_username: None,
            mqtt_password: None,
            command_prefix: default_command_prefix(),
            notice_prefix: default_notice_prefix(),
            baseline_cm: 150.0,
            margin_cm: 30.0,
            echo_timeout_ms: 25,
            poll_interval_ms: 100,
            sim_distance_cm: default_sim_distance_cm(),
            sim_temperature_c: default_sim_temperature_c(),
            metrics_interval_secs: 60,
            prometheus_port: 0,
            broker_embedded: false,
            broker_bind_address: default_broker_bind_address(),
            broker_port: default_broker_port(),
            journal_enabled: true,
            journal_dir: default_journal_dir(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            node_id: toml_config.node.id,
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            command_prefix: toml_config.topics.command_prefix,
            notice_prefix: toml_config.topics.notice_prefix,
            baseline_cm: toml_config.sensors.baseline_cm,
            margin_cm: toml_config.sensors.margin_cm,
            echo_timeout_ms: toml_config.sensors.echo_timeout_ms,
            poll_interval_ms: toml_config.sensors.poll_interval_ms,
            sim_distance_cm: toml_config.sim.distance_cm,
            sim_temperature_c: toml_config.sim.temperature_c,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            broker_embedded: toml_config.broker.embedded,
            broker_bind_address: toml_config.broker.bind_address,
            broker_port: toml_config.broker.port,
            journal_enabled: toml_config.journal.enabled,
            journal_dir: toml_config.journal.dir,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from a path - falls back to defaults with a warning
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Topic filters this node subscribes to
    pub fn subscription_filters(&self) -> [String; 2] {
        [
            format!("{}/command/+", self.command_prefix),
            format!("{}/request/+", self.command_prefix),
        ]
    }

    pub fn occ_change_topic(&self) -> String {
        format!("{}/notice/occ_change", self.notice_prefix)
    }

    pub fn temp_notice_topic(&self) -> String {
        format!("{}/notice/temp", self.notice_prefix)
    }

    pub fn log_notice_topic(&self) -> String {
        format!("{}/notice/log", self.notice_prefix)
    }

    pub fn status_notice_topic(&self) -> String {
        format!("{}/notice/status", self.notice_prefix)
    }

    // Getters for all config fields
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    pub fn notice_prefix(&self) -> &str {
        &self.notice_prefix
    }

    pub fn baseline_cm(&self) -> f64 {
        self.baseline_cm
    }

    pub fn margin_cm(&self) -> f64 {
        self.margin_cm
    }

    pub fn echo_timeout_ms(&self) -> u64 {
        self.echo_timeout_ms
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn sim_distance_cm(&self) -> f64 {
        self.sim_distance_cm
    }

    pub fn sim_temperature_c(&self) -> f64 {
        self.sim_temperature_c
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn broker_embedded(&self) -> bool {
        self.broker_embedded
    }

    pub fn broker_bind_address(&self) -> &str {
        &self.broker_bind_address
    }

    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    pub fn journal_enabled(&self) -> bool {
        self.journal_enabled
    }

    pub fn journal_dir(&self) -> &str {
        &self.journal_dir
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the sensor geometry
    #[cfg(test)]
    pub fn with_sensor_geometry(mut self, baseline_cm: f64, margin_cm: f64) -> Self {
        self.baseline_cm = baseline_cm;
        self.margin_cm = margin_cm;
        self
    }
}
