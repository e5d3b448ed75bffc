//! semi-link - Serial bridge daemon between the Pi node and the Teensy
//!
//! Runs the Pi-side link loop: drains telemetry records from the UART,
//! publishes the newest decoded frame each cycle, mirrors the drive-mode
//! flag onto the relay lines, and passes actuator commands through to the
//! wire. The middleware bridge delivers commands on the crossbeam channel
//! and consumes telemetry through the sink seam; this binary installs
//! logging stand-ins for both.

use semi_link::config::AppConfig;
use semi_link::error::{Error, Result};
use semi_link::link::{LinkDriver, RelayOutputs, TelemetrySink};
use semi_link::protocol::SensorFrame;
use semi_link::transport::SerialTransport;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `semi-link <path>` (positional)
/// - `semi-link --config <path>` (flag-based)
/// - `semi-link -c <path>` (short flag)
///
/// Defaults to `/etc/semilink.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/semilink.toml".to_string()
}

/// Telemetry sink that logs each published frame
struct LogTelemetrySink;

impl TelemetrySink for LogTelemetrySink {
    fn publish(&mut self, frame: &SensorFrame) {
        log::debug!(
            "Sensors: wheel_speed={} imu_angle={} right={} left={} rear={} drive_mode={}",
            frame.wheel_speed,
            frame.imu_angle,
            frame.right_distance,
            frame.left_distance,
            frame.rear_distance,
            frame.drive_mode
        );
    }
}

/// Relay stand-in that logs drive-mode line changes
#[derive(Default)]
struct LogRelays {
    last: Option<(bool, bool)>,
}

impl RelayOutputs for LogRelays {
    fn set(&mut self, line_a: bool, line_b: bool) {
        if self.last != Some((line_a, line_b)) {
            log::info!("Drive mode relays: line_a={} line_b={}", line_a, line_b);
            self.last = Some((line_a, line_b));
        }
    }
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("semi-link starting...");

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = AppConfig::from_file(&config_path)?;

    log::info!(
        "Link: {} at {} baud, {} Hz cycle, {} telemetry",
        config.link.port,
        config.link.baud_rate,
        config.link.loop_hz,
        if config.protocol.extended_telemetry {
            "extended"
        } else {
            "standard"
        }
    );

    let transport = SerialTransport::open(&config.link.port, config.link.baud_rate)?;

    // Command channel: the middleware bridge holds the sender and delivers
    // one ActuatorFrame per inbound command. Kept open for the daemon's
    // lifetime; dropping it stops the link loop.
    let (command_tx, command_rx) = crossbeam_channel::bounded(8);

    let driver = LinkDriver::new(
        transport,
        config.protocol.frame_format(),
        command_rx,
        Box::new(LogTelemetrySink),
        Box::new(LogRelays::default()),
        config.link.sync_timeout(),
    );

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("semi-link running. Press Ctrl-C to stop.");

    // The link loop owns the serial handle and runs on the main thread;
    // synchronization is reacquired from scratch on every start.
    driver.run(config.link.loop_period(), running);

    drop(command_tx);
    log::info!("semi-link stopped");
    Ok(())
}
