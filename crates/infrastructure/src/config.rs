use config::{Config, ConfigError, Environment, File};
use domain::driver::{DriverSettings, TransportKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(rename = "type", default = "default_transport_kind")]
    pub kind: TransportKind,
    /// Transport-specific settings, interpreted by `TransportFactory`
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_transport_kind() -> TransportKind {
    TransportKind::Serial
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            config: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default)]
    pub transport: TransportConfig,
    /// tracing `EnvFilter` directive used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info,robot_agent=debug,application=debug".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            driver: DriverSettings::default(),
            transport: TransportConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl AgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // 1. Defaults
            .set_default("transport.type", "serial")?
            // 2. Shared config file, e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // 3. Run-mode overrides (config/development.toml, ...)
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // 4. Environment (e.g. ROBOT__DRIVER__POLLING_INTERVAL_MS=250)
            .add_source(
                Environment::with_prefix("ROBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config_dir(name: &str, default_toml: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("robot-config-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = std::fs::File::create(dir.join("default.toml")).unwrap();
        file.write_all(default_toml.as_bytes()).unwrap();
        dir
    }

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.driver, DriverSettings::default());
        assert_eq!(config.transport.kind, TransportKind::Serial);
        assert!(config.transport.config.is_null());
        assert!(config.log_filter.starts_with("info"));
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("robot-config-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let config = AgentConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.transport.kind, TransportKind::Serial);
        assert_eq!(config.driver.polling_interval_ms, 500);
        assert_eq!(config.driver.send_rate_max, 40);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = temp_config_dir(
            "toml",
            r#"
[driver]
polling_interval_ms = 250
stop_ports = [0]

[[driver.poll_targets]]
command = "GET_ULTRASONIC"
port = 1

[transport]
type = "simulator"

[transport.config]
reply_delay_ms = 5
"#,
        );

        let config = AgentConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.driver.polling_interval_ms, 250);
        assert_eq!(config.driver.send_rate_max, 40);
        assert_eq!(config.driver.stop_ports, vec![0]);
        assert_eq!(config.driver.poll_targets.len(), 1);
        assert_eq!(config.driver.poll_targets[0].port, 1);
        assert_eq!(config.transport.kind, TransportKind::Simulator);
        assert_eq!(config.transport.config["reply_delay_ms"], 5);
    }

    #[test]
    fn test_run_mode_file_overrides_default_file() {
        let dir = temp_config_dir(
            "layers",
            r#"
[driver]
polling_interval_ms = 250
send_rate_max = 20
"#,
        );
        std::fs::write(
            dir.join("development.toml"),
            "[driver]\npolling_interval_ms = 100\n",
        )
        .unwrap();

        // RUN_MODE is unset under test, so the development layer applies
        if std::env::var("RUN_MODE").is_err() {
            let config = AgentConfig::load(dir.to_str().unwrap()).unwrap();
            assert_eq!(config.driver.polling_interval_ms, 100);
            assert_eq!(config.driver.send_rate_max, 20);
        }
    }
}
