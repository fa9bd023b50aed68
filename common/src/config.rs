use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest word sequence of the command vocabulary (`start sd card`).
const LONGEST_COMMAND: usize = 13;

/// Upper bound of any lock wait. A task holding a lock longer than this is stuck.
const MAX_LOCK_WAIT_MS: u64 = 10_000;

/// All tunables of the station. Every field has a default, so a config file
/// only needs to name what it changes.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    pub timing: TimingConfig,
    pub locks: LockConfig,
    pub aggregation: AggregationConfig,
    pub supervisor: SupervisorConfig,
    pub command: CommandConfig,
    pub telemetry: TelemetryConfig,
    pub devices: DeviceConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub sensor_read_interval_ms: u64,
    pub display_update_interval_ms: u64,
    pub log_sample_interval_ms: u64,
    pub telemetry_sample_interval_ms: u64,
    pub command_poll_interval_ms: u64,
    pub network_connect_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sensor_read_interval_ms: 1000,
            display_update_interval_ms: 1000,
            log_sample_interval_ms: 1000,
            telemetry_sample_interval_ms: 1000,
            command_poll_interval_ms: 20,
            network_connect_interval_ms: 500,
        }
    }
}

/// Bounded waits for the three locks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LockConfig {
    pub sensor_wait_ms: u64,
    pub bus_wait_ms: u64,
    pub storage_wait_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            sensor_wait_ms: 10,
            bus_wait_ms: 100,
            storage_wait_ms: 100,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    pub log_samples: usize,
    pub telemetry_samples: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            log_samples: 30,
            telemetry_samples: 60,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    pub hardware_check_interval_ms: u64,
    pub running_blink_interval_ms: u64,
    pub error_blink_interval_ms: u64,
    pub led_pulse_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            hardware_check_interval_ms: 5000,
            running_blink_interval_ms: 2500,
            error_blink_interval_ms: 500,
            led_pulse_ms: 100,
        }
    }
}

impl SupervisorConfig {
    pub fn hardware_check_interval(&self) -> Duration {
        Duration::from_millis(self.hardware_check_interval_ms)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CommandConfig {
    /// Characters kept per line; the rest of a longer line is dropped.
    pub max_line_len: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self { max_line_len: 20 }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prefix of every remote key, empty for the store root.
    pub root: String,
    pub pump_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            pump_interval_ms: 100,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub sensor_address: u8,
    pub display_address: u8,
    pub display_text_size: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sensor_address: 0x76,
            display_address: 0x3C,
            display_text_size: 2,
        }
    }
}

impl StationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("timing.sensor_read_interval_ms", self.timing.sensor_read_interval_ms),
            ("timing.display_update_interval_ms", self.timing.display_update_interval_ms),
            ("timing.log_sample_interval_ms", self.timing.log_sample_interval_ms),
            ("timing.telemetry_sample_interval_ms", self.timing.telemetry_sample_interval_ms),
            ("timing.command_poll_interval_ms", self.timing.command_poll_interval_ms),
            ("supervisor.hardware_check_interval_ms", self.supervisor.hardware_check_interval_ms),
            ("telemetry.pump_interval_ms", self.telemetry.pump_interval_ms),
        ];
        if let Some(&(field, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid {
                field,
                reason: "period must be at least 1 ms".into(),
            });
        }

        let waits = [
            ("locks.sensor_wait_ms", self.locks.sensor_wait_ms),
            ("locks.bus_wait_ms", self.locks.bus_wait_ms),
            ("locks.storage_wait_ms", self.locks.storage_wait_ms),
        ];
        if let Some(&(field, _)) = waits
            .iter()
            .find(|(_, ms)| !(1..=MAX_LOCK_WAIT_MS).contains(ms))
        {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("lock wait must be between 1 and {MAX_LOCK_WAIT_MS} ms"),
            });
        }

        if self.aggregation.log_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "aggregation.log_samples",
                reason: "capacity must be at least 1".into(),
            });
        }
        if self.aggregation.telemetry_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "aggregation.telemetry_samples",
                reason: "capacity must be at least 1".into(),
            });
        }

        if self.command.max_line_len < LONGEST_COMMAND {
            return Err(ConfigError::Invalid {
                field: "command.max_line_len",
                reason: format!("must fit the longest command ({LONGEST_COMMAND} characters)"),
            });
        }

        Ok(())
    }
}

#[test]
fn test_empty_json_gives_defaults() {
    let config = StationConfig::from_json("{}").unwrap();
    assert_eq!(config, StationConfig::default());
    assert_eq!(config.aggregation.log_samples, 30);
    assert_eq!(config.aggregation.telemetry_samples, 60);
    assert_eq!(config.locks.sensor_wait_ms, 10);
    assert_eq!(config.locks.bus_wait_ms, 100);
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config = StationConfig::from_json(
        r#"{ "aggregation": { "log_samples": 5 }, "telemetry": { "root": "/devices/ws1" } }"#,
    )
    .unwrap();
    assert_eq!(config.aggregation.log_samples, 5);
    assert_eq!(config.aggregation.telemetry_samples, 60);
    assert_eq!(config.telemetry.root, "/devices/ws1");
    assert_eq!(config.telemetry.pump_interval_ms, 100);
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(matches!(
        StationConfig::from_json(r#"{ "aggregation": { "telemetry_samples": 0 } }"#),
        Err(ConfigError::Invalid { field: "aggregation.telemetry_samples", .. })
    ));
    assert!(matches!(
        StationConfig::from_json(r#"{ "timing": { "sensor_read_interval_ms": 0 } }"#),
        Err(ConfigError::Invalid { field: "timing.sensor_read_interval_ms", .. })
    ));
    assert!(matches!(
        StationConfig::from_json(r#"{ "command": { "max_line_len": 4 } }"#),
        Err(ConfigError::Invalid { field: "command.max_line_len", .. })
    ));
    assert!(matches!(
        StationConfig::from_json("{ not json"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_lock_waits_are_bounded() {
    assert!(matches!(
        StationConfig::from_json(r#"{ "locks": { "bus_wait_ms": 18446744073709551615 } }"#),
        Err(ConfigError::Invalid { field: "locks.bus_wait_ms", .. })
    ));
    assert!(matches!(
        StationConfig::from_json(r#"{ "locks": { "storage_wait_ms": 10001 } }"#),
        Err(ConfigError::Invalid { field: "locks.storage_wait_ms", .. })
    ));
    assert!(matches!(
        StationConfig::from_json(r#"{ "locks": { "sensor_wait_ms": 0 } }"#),
        Err(ConfigError::Invalid { field: "locks.sensor_wait_ms", .. })
    ));
    let config = StationConfig::from_json(r#"{ "locks": { "bus_wait_ms": 10000 } }"#).unwrap();
    assert_eq!(config.locks.bus_wait_ms, 10_000);
}
