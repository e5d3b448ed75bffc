//! Configuration for the semi-link daemon
//!
//! Loads configuration from a TOML file with the few parameters the link
//! needs: serial port, cycle cadence, and the telemetry frame format.

use crate::error::Result;
use crate::protocol::FrameFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

/// Serial link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Serial port connected to the Teensy (e.g., "/dev/ttyS0")
    pub port: String,
    /// Baud rate; must match the firmware's UART setup
    pub baud_rate: u32,
    /// Read/publish cycle frequency in Hz; must match the controller node
    pub loop_hz: u32,
    /// Upper bound on one sentinel scan before the link is declared lost
    pub sync_timeout_ms: u64,
}

/// Wire protocol configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Both endpoints must agree on this: when true, every sensor frame
    /// carries the drive_mode_2 trailer field (14-byte frames).
    pub extended_telemetry: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration matching the truck's Pi wiring
    ///
    /// Suitable for testing and development. Deployments should use a
    /// proper TOML configuration file.
    pub fn truck_defaults() -> Self {
        Self {
            link: LinkConfig {
                port: "/dev/ttyS0".to_string(),
                baud_rate: 9600,
                loop_hz: 20,
                sync_timeout_ms: 250,
            },
            protocol: ProtocolConfig {
                extended_telemetry: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl LinkConfig {
    /// Cycle period derived from `loop_hz`
    pub fn loop_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.loop_hz.max(1)))
    }

    /// Sentinel scan deadline as a `Duration`
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }
}

impl ProtocolConfig {
    /// Frame format agreed with the firmware
    pub fn frame_format(&self) -> FrameFormat {
        if self.extended_telemetry {
            FrameFormat::Extended
        } else {
            FrameFormat::Standard
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::truck_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::truck_defaults();
        assert_eq!(config.link.port, "/dev/ttyS0");
        assert_eq!(config.link.baud_rate, 9600);
        assert_eq!(config.link.loop_hz, 20);
        assert!(!config.protocol.extended_telemetry);
        assert_eq!(config.link.loop_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::truck_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[link]"));
        assert!(toml_string.contains("[protocol]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("port = \"/dev/ttyS0\""));
        assert!(toml_string.contains("extended_telemetry = false"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[link]
port = "/dev/ttyUSB0"
baud_rate = 115200
loop_hz = 50
sync_timeout_ms = 100

[protocol]
extended_telemetry = true

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.link.port, "/dev/ttyUSB0");
        assert_eq!(config.link.baud_rate, 115200);
        assert_eq!(config.protocol.frame_format(), FrameFormat::Extended);
        assert_eq!(config.logging.level, "debug");
    }
}
