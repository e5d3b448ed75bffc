//! Link driver: the periodic read/sync/decode cycle and the on-demand
//! write path over the Teensy serial link
//!
//! Two symmetric roles share the protocol:
//! - [`LinkDriver`] runs on the Pi: drains buffered telemetry records,
//!   publishes the newest decoded frame once per cycle, and passes
//!   inbound actuator commands straight through to the wire.
//! - [`ActuatorEndpoint`] is the microcontroller-side inverse: decodes
//!   actuator records and drives the motor and steering outputs through
//!   the control loops.
//!
//! The transport is confined to the thread running the cycle, so reads
//! and writes of multi-byte records never interleave.

use crate::control::{scale_motor_output, MotorController, SteerServo};
use crate::error::{Error, Result};
use crate::protocol::{sync, ActuatorFrame, FrameFormat, SensorFrame, FIELD_SIZE};
use crate::transport::{write_all, Transport};
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Outbound seam for decoded telemetry (the middleware publisher)
pub trait TelemetrySink: Send {
    /// Accept one decoded frame; called at most once per cycle
    fn publish(&mut self, frame: &SensorFrame);
}

/// The two digital output lines mirroring the drive-mode flag
pub trait RelayOutputs: Send {
    /// Drive both relay lines
    fn set(&mut self, line_a: bool, line_b: bool);
}

/// Hardware outputs on the actuation endpoint
pub trait ActuatorOutputs: Send {
    /// Motor drive signal, already scaled to [0, 180]
    fn set_motor(&mut self, output: i16);
    /// Steering servo angle in [0, 180]
    fn set_steer(&mut self, angle: i16);
    /// Fifth-wheel lock output
    fn set_fifth(&mut self, output: i16);
}

/// Pi-side link driver: reader/publisher plus command pass-through
pub struct LinkDriver<T: Transport> {
    transport: T,
    format: FrameFormat,
    commands: Receiver<ActuatorFrame>,
    sink: Box<dyn TelemetrySink>,
    relays: Box<dyn RelayOutputs>,
    sync_timeout: Duration,
    latest: Option<SensorFrame>,
}

impl<T: Transport> LinkDriver<T> {
    /// Create a driver around an opened transport
    pub fn new(
        transport: T,
        format: FrameFormat,
        commands: Receiver<ActuatorFrame>,
        sink: Box<dyn TelemetrySink>,
        relays: Box<dyn RelayOutputs>,
        sync_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            format,
            commands,
            sink,
            relays,
            sync_timeout,
            latest: None,
        }
    }

    /// One link cycle: drain telemetry, publish, flush pending command
    ///
    /// Cadence is owned by the caller; this never sleeps on its own.
    pub fn run_cycle(&mut self) -> Result<()> {
        self.read_telemetry()?;
        self.publish_latest();
        self.write_pending_command()?;
        Ok(())
    }

    /// Drain every complete framed record currently buffered
    ///
    /// The byte count is checked up front so sync and decode only run
    /// when a full record is already pending; the last decode wins.
    fn read_telemetry(&mut self) -> Result<()> {
        let record_len = self.format.framed_len();
        let waiting = self.transport.available()?;

        for _ in 0..waiting / record_len {
            sync(&mut self.transport, self.sync_timeout)?;

            if self.transport.available()? >= self.format.sensor_len() {
                let frame = SensorFrame::decode(&mut self.transport, self.format)?;
                log::debug!("Telemetry: {:?}", frame);
                self.latest = Some(frame);
            }
        }
        Ok(())
    }

    /// Publish the newest frame and mirror its drive mode onto the relays
    ///
    /// Nothing is published before the first successful decode; an
    /// all-zero placeholder would actuate the relays spuriously.
    fn publish_latest(&mut self) {
        if let Some(frame) = self.latest {
            self.sink.publish(&frame);

            let engaged = frame.drive_mode != 0;
            self.relays.set(engaged, !engaged);
        }
    }

    /// Encode and write the newest pending actuator command, if any
    ///
    /// Direct pass-through: no retry, no acknowledgment, and commands
    /// that arrived while the cycle was busy collapse to the newest one.
    fn write_pending_command(&mut self) -> Result<()> {
        let mut newest = None;
        loop {
            match self.commands.try_recv() {
                Ok(frame) => newest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(Error::Disconnected),
            }
        }

        if let Some(frame) = newest {
            log::debug!("Command: {:?}", frame);
            write_all(&mut self.transport, &frame.encode_with_sync())?;
            self.transport.flush()?;
        }
        Ok(())
    }

    /// Drive cycles at a fixed cadence until shutdown
    ///
    /// A lost link is logged and rescanned next cycle; a closed command
    /// channel stops the loop.
    pub fn run(mut self, period: Duration, shutdown: Arc<AtomicBool>) {
        log::info!("Link loop started ({} ms cycle)", period.as_millis());
        let mut overrun_count = 0u32;

        while !shutdown.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            match self.run_cycle() {
                Ok(()) => {}
                Err(Error::LinkLost(ms)) => {
                    log::warn!("Link: no sentinel within {} ms, rescanning next cycle", ms);
                }
                Err(Error::Disconnected) => {
                    log::info!("Link: command source closed, stopping");
                    break;
                }
                Err(e) => log::error!("Link cycle error: {}", e),
            }

            let elapsed = cycle_start.elapsed();
            if elapsed > period {
                overrun_count += 1;
                if overrun_count % 10 == 1 {
                    log::warn!(
                        "Link: cycle overrun {:.1} ms (target {:.1} ms), {} overruns",
                        elapsed.as_secs_f32() * 1000.0,
                        period.as_secs_f32() * 1000.0,
                        overrun_count
                    );
                }
            }

            thread::sleep(period.saturating_sub(elapsed));
        }

        log::info!("Link loop stopped");
    }
}

/// Microcontroller-side endpoint: decodes actuator records and drives the
/// outputs through the control loops
pub struct ActuatorEndpoint<T: Transport> {
    transport: T,
    motor: MotorController,
    steer: SteerServo,
    outputs: Box<dyn ActuatorOutputs>,
    sync_timeout: Duration,
}

impl<T: Transport> ActuatorEndpoint<T> {
    /// Framed actuator record size on the wire
    const RECORD_LEN: usize = FIELD_SIZE + ActuatorFrame::WIRE_LEN;

    /// Create an endpoint around an opened transport
    pub fn new(transport: T, outputs: Box<dyn ActuatorOutputs>, sync_timeout: Duration) -> Self {
        Self {
            transport,
            motor: MotorController::new(),
            steer: SteerServo::new(),
            outputs,
            sync_timeout,
        }
    }

    /// Drain every complete actuator record and apply each in order
    ///
    /// Applying in arrival order leaves the newest command in effect.
    pub fn run_cycle(&mut self) -> Result<()> {
        let waiting = self.transport.available()?;

        for _ in 0..waiting / Self::RECORD_LEN {
            sync(&mut self.transport, self.sync_timeout)?;

            if self.transport.available()? >= ActuatorFrame::WIRE_LEN {
                let command = ActuatorFrame::decode(&mut self.transport)?;
                log::debug!("Actuators: {:?}", command);
                self.apply(command);
            }
        }
        Ok(())
    }

    /// Apply one command through the control transforms
    fn apply(&mut self, command: ActuatorFrame) {
        self.outputs.set_motor(scale_motor_output(command.motor_output));

        if let Some(angle) = self.steer.command(command.steer_output) {
            self.outputs.set_steer(angle);
        }

        self.outputs.set_fifth(command.fifth_output);
    }

    /// One dead-man stop iteration: decelerate toward zero wheel speed
    ///
    /// Called instead of applying remote commands while the dead-man
    /// switch is released.
    pub fn stop_cycle(&mut self, wheel_speed: i16, time_step_ms: i16) {
        let output = self.motor.stop_motor(wheel_speed, time_step_ms);
        self.outputs.set_motor(output);
    }

    /// Explicit reset of the stop controller accumulator
    pub fn reset_stop_controller(&mut self) {
        self.motor.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crossbeam_channel::bounded;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CaptureSink {
        frames: Arc<Mutex<Vec<SensorFrame>>>,
    }

    impl TelemetrySink for CaptureSink {
        fn publish(&mut self, frame: &SensorFrame) {
            self.frames.lock().unwrap().push(*frame);
        }
    }

    #[derive(Clone, Default)]
    struct CaptureRelays {
        states: Arc<Mutex<Vec<(bool, bool)>>>,
    }

    impl RelayOutputs for CaptureRelays {
        fn set(&mut self, line_a: bool, line_b: bool) {
            self.states.lock().unwrap().push((line_a, line_b));
        }
    }

    #[derive(Clone, Default)]
    struct CaptureOutputs {
        motor: Arc<Mutex<Vec<i16>>>,
        steer: Arc<Mutex<Vec<i16>>>,
        fifth: Arc<Mutex<Vec<i16>>>,
    }

    impl ActuatorOutputs for CaptureOutputs {
        fn set_motor(&mut self, output: i16) {
            self.motor.lock().unwrap().push(output);
        }
        fn set_steer(&mut self, angle: i16) {
            self.steer.lock().unwrap().push(angle);
        }
        fn set_fifth(&mut self, output: i16) {
            self.fifth.lock().unwrap().push(output);
        }
    }

    fn test_driver(
        mock: &MockTransport,
    ) -> (
        LinkDriver<MockTransport>,
        crossbeam_channel::Sender<ActuatorFrame>,
        CaptureSink,
        CaptureRelays,
    ) {
        let (tx, rx) = bounded(8);
        let sink = CaptureSink::default();
        let relays = CaptureRelays::default();
        let driver = LinkDriver::new(
            mock.clone(),
            FrameFormat::Standard,
            rx,
            Box::new(sink.clone()),
            Box::new(relays.clone()),
            Duration::from_millis(10),
        );
        (driver, tx, sink, relays)
    }

    #[test]
    fn test_reader_cycle_publishes_one_frame() {
        let frame = SensorFrame {
            wheel_speed: 10,
            imu_angle: 5,
            right_distance: 100,
            left_distance: 100,
            rear_distance: 100,
            drive_mode: 1,
            drive_mode_2: 0,
        };

        let mock = MockTransport::new();
        mock.inject_read(&frame.encode_with_sync(FrameFormat::Standard));

        let (mut driver, _tx, sink, relays) = test_driver(&mock);
        driver.run_cycle().unwrap();

        let published = sink.frames.lock().unwrap();
        assert_eq!(published.as_slice(), &[frame]);

        // Drive mode 1 mirrors as (on, off)
        let states = relays.states.lock().unwrap();
        assert_eq!(states.as_slice(), &[(true, false)]);
    }

    #[test]
    fn test_reader_last_decode_wins() {
        let first = SensorFrame {
            wheel_speed: 1,
            ..SensorFrame::default()
        };
        let second = SensorFrame {
            wheel_speed: 2,
            ..SensorFrame::default()
        };

        let mock = MockTransport::new();
        mock.inject_read(&first.encode_with_sync(FrameFormat::Standard));
        mock.inject_read(&second.encode_with_sync(FrameFormat::Standard));

        let (mut driver, _tx, sink, _relays) = test_driver(&mock);
        driver.run_cycle().unwrap();

        // Both records drained, only the newest published, exactly once
        let published = sink.frames.lock().unwrap();
        assert_eq!(published.as_slice(), &[second]);
    }

    #[test]
    fn test_no_publish_before_first_decode() {
        let mock = MockTransport::new();
        let (mut driver, _tx, sink, relays) = test_driver(&mock);

        driver.run_cycle().unwrap();

        assert!(sink.frames.lock().unwrap().is_empty());
        assert!(relays.states.lock().unwrap().is_empty());
    }

    #[test]
    fn test_noise_only_buffer_reports_link_lost() {
        let mock = MockTransport::new();
        // A full record's worth of bytes with no sentinel anywhere
        mock.inject_read(&[0x42; 14]);

        let (mut driver, _tx, _sink, _relays) = test_driver(&mock);
        let err = driver.run_cycle().unwrap_err();
        assert!(matches!(err, Error::LinkLost(_)));
    }

    #[test]
    fn test_writer_emits_framed_record() {
        let mock = MockTransport::new();
        let (mut driver, tx, _sink, _relays) = test_driver(&mock);

        let command = ActuatorFrame {
            motor_output: 50,
            steer_output: 120,
            fifth_output: 1,
        };
        tx.send(command).unwrap();
        driver.run_cycle().unwrap();

        assert_eq!(mock.get_written(), command.encode_with_sync().to_vec());
    }

    #[test]
    fn test_writer_newest_command_wins() {
        let mock = MockTransport::new();
        let (mut driver, tx, _sink, _relays) = test_driver(&mock);

        tx.send(ActuatorFrame {
            motor_output: 10,
            ..ActuatorFrame::default()
        })
        .unwrap();
        let newest = ActuatorFrame {
            motor_output: 20,
            ..ActuatorFrame::default()
        };
        tx.send(newest).unwrap();
        driver.run_cycle().unwrap();

        // Only one record on the wire, and it is the newest
        assert_eq!(mock.get_written(), newest.encode_with_sync().to_vec());
    }

    #[test]
    fn test_closed_command_channel_stops_driver() {
        let mock = MockTransport::new();
        let (mut driver, tx, _sink, _relays) = test_driver(&mock);

        drop(tx);
        let err = driver.run_cycle().unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[test]
    fn test_actuator_endpoint_applies_control_loops() {
        let mock = MockTransport::new();
        let outputs = CaptureOutputs::default();
        let mut endpoint = ActuatorEndpoint::new(
            mock.clone(),
            Box::new(outputs.clone()),
            Duration::from_millis(10),
        );

        let command = ActuatorFrame {
            motor_output: -150,
            steer_output: 200,
            fifth_output: 3,
        };
        mock.inject_read(&command.encode_with_sync());
        endpoint.run_cycle().unwrap();

        // Motor clamped and floored, steering forced straight
        assert_eq!(outputs.motor.lock().unwrap().as_slice(), &[35]);
        assert_eq!(outputs.steer.lock().unwrap().as_slice(), &[90]);
        assert_eq!(outputs.fifth.lock().unwrap().as_slice(), &[3]);
    }

    #[test]
    fn test_actuator_endpoint_suppresses_redundant_steer_writes() {
        let mock = MockTransport::new();
        let outputs = CaptureOutputs::default();
        let mut endpoint = ActuatorEndpoint::new(
            mock.clone(),
            Box::new(outputs.clone()),
            Duration::from_millis(10),
        );

        let command = ActuatorFrame {
            motor_output: 0,
            steer_output: 45,
            fifth_output: 0,
        };
        mock.inject_read(&command.encode_with_sync());
        mock.inject_read(&command.encode_with_sync());
        endpoint.run_cycle().unwrap();

        // Two commands applied, one steering write
        assert_eq!(outputs.motor.lock().unwrap().as_slice(), &[90, 90]);
        assert_eq!(outputs.steer.lock().unwrap().as_slice(), &[45]);
    }

    #[test]
    fn test_actuator_endpoint_stop_cycle() {
        let mock = MockTransport::new();
        let outputs = CaptureOutputs::default();
        let mut endpoint =
            ActuatorEndpoint::new(mock, Box::new(outputs.clone()), Duration::from_millis(10));

        // Rolling forward: stop output must brake below the 90 bias
        endpoint.stop_cycle(200, 50);
        let motor = outputs.motor.lock().unwrap();
        assert_eq!(motor.len(), 1);
        assert!(motor[0] < 90);
    }
}
