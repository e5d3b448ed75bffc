//! Fixed-layout sensor and actuator frame codecs
//!
//! Field order and sizes are part of the wire contract with the firmware;
//! encoding is explicit little-endian, one field at a time.

use super::{FIELD_SIZE, SYNC_SENTINEL};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Attempts to pull two bytes out of the stream before giving up on a
/// promised read
const SHORT_READ_RETRIES: usize = 100;

/// Telemetry frame format agreed by both endpoints
///
/// The firmware either sends the 6-field frame or always appends the
/// `drive_mode_2` trailer. The format is fixed by configuration on both
/// ends, never guessed from buffered byte counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 6 fields, 12 bytes on the wire
    Standard,
    /// 7 fields with the drive_mode_2 trailer, 14 bytes on the wire
    Extended,
}

impl FrameFormat {
    /// Wire size of a sensor frame body (without the sentinel)
    pub fn sensor_len(self) -> usize {
        match self {
            FrameFormat::Standard => 6 * FIELD_SIZE,
            FrameFormat::Extended => 7 * FIELD_SIZE,
        }
    }

    /// Wire size of one complete framed record (sentinel + sensor frame)
    pub fn framed_len(self) -> usize {
        FIELD_SIZE + self.sensor_len()
    }
}

/// Telemetry record sent by the Teensy once per read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorFrame {
    /// Wheel speed sensor reading
    pub wheel_speed: i16,
    /// IMU euler angle
    pub imu_angle: i16,
    /// Right rangefinder distance
    pub right_distance: i16,
    /// Left rangefinder distance
    pub left_distance: i16,
    /// Rear rangefinder distance
    pub rear_distance: i16,
    /// Drive mode flag mirrored onto the relay lines
    pub drive_mode: i16,
    /// Optional trailer; zero when the link runs the standard format
    pub drive_mode_2: i16,
}

/// Command record applied by the Teensy exactly once, newest wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorFrame {
    /// Motor drive value, nominally in [-100, 100]
    pub motor_output: i16,
    /// Steering servo angle, nominally in [0, 180]
    pub steer_output: i16,
    /// Fifth-wheel lock actuator value
    pub fifth_output: i16,
}

/// Assemble one little-endian i16 from the stream, low byte first
fn read_i16(transport: &mut dyn Transport) -> Result<i16> {
    let mut buf = [0u8; FIELD_SIZE];
    let mut filled = 0;
    let mut attempts = 0;

    while filled < FIELD_SIZE {
        filled += transport.read(&mut buf[filled..])?;
        attempts += 1;
        if attempts > SHORT_READ_RETRIES {
            return Err(Error::ShortRead {
                expected: FIELD_SIZE,
                actual: filled,
            });
        }
    }

    Ok(i16::from_le_bytes(buf))
}

impl SensorFrame {
    /// Decode a sensor frame from the stream
    ///
    /// The caller must have confirmed that a full frame is buffered; this
    /// reads exactly `format.sensor_len()` bytes in fixed field order.
    pub fn decode(transport: &mut dyn Transport, format: FrameFormat) -> Result<Self> {
        let mut frame = SensorFrame {
            wheel_speed: read_i16(transport)?,
            imu_angle: read_i16(transport)?,
            right_distance: read_i16(transport)?,
            left_distance: read_i16(transport)?,
            rear_distance: read_i16(transport)?,
            drive_mode: read_i16(transport)?,
            drive_mode_2: 0,
        };

        if format == FrameFormat::Extended {
            frame.drive_mode_2 = read_i16(transport)?;
        }

        Ok(frame)
    }

    /// Encode the frame body, without the sentinel
    ///
    /// The transmitting side prepends [`SYNC_SENTINEL`] itself; see
    /// [`SensorFrame::encode_with_sync`].
    pub fn encode(&self, format: FrameFormat) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(format.sensor_len());
        bytes.extend_from_slice(&self.wheel_speed.to_le_bytes());
        bytes.extend_from_slice(&self.imu_angle.to_le_bytes());
        bytes.extend_from_slice(&self.right_distance.to_le_bytes());
        bytes.extend_from_slice(&self.left_distance.to_le_bytes());
        bytes.extend_from_slice(&self.rear_distance.to_le_bytes());
        bytes.extend_from_slice(&self.drive_mode.to_le_bytes());
        if format == FrameFormat::Extended {
            bytes.extend_from_slice(&self.drive_mode_2.to_le_bytes());
        }
        bytes
    }

    /// Encode the complete framed record: sentinel then frame body
    pub fn encode_with_sync(&self, format: FrameFormat) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(format.framed_len());
        bytes.extend_from_slice(&SYNC_SENTINEL.to_le_bytes());
        bytes.extend_from_slice(&self.encode(format));
        bytes
    }
}

impl ActuatorFrame {
    /// Wire size of the frame body
    pub const WIRE_LEN: usize = 3 * FIELD_SIZE;

    /// Decode an actuator frame from the stream (receiving endpoint)
    pub fn decode(transport: &mut dyn Transport) -> Result<Self> {
        Ok(ActuatorFrame {
            motor_output: read_i16(transport)?,
            steer_output: read_i16(transport)?,
            fifth_output: read_i16(transport)?,
        })
    }

    /// Encode the complete framed record: sentinel, then motor, steer and
    /// fifth-wheel outputs
    pub fn encode_with_sync(&self) -> [u8; FIELD_SIZE + Self::WIRE_LEN] {
        let mut bytes = [0u8; FIELD_SIZE + Self::WIRE_LEN];
        bytes[0..2].copy_from_slice(&SYNC_SENTINEL.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.motor_output.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.steer_output.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.fifth_output.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sync;
    use crate::transport::MockTransport;
    use std::time::Duration;

    #[test]
    fn test_wire_sizes() {
        assert_eq!(FrameFormat::Standard.sensor_len(), 12);
        assert_eq!(FrameFormat::Extended.sensor_len(), 14);
        assert_eq!(FrameFormat::Standard.framed_len(), 14);
        assert_eq!(FrameFormat::Extended.framed_len(), 16);
        assert_eq!(ActuatorFrame::WIRE_LEN, 6);
    }

    #[test]
    fn test_sentinel_wire_image() {
        // -32000 = 0x8300, low byte first on the wire
        assert_eq!(SYNC_SENTINEL.to_le_bytes(), [0x00, 0x83]);
    }

    #[test]
    fn test_sensor_round_trip_standard() {
        let frame = SensorFrame {
            wheel_speed: i16::MIN,
            imu_angle: -1,
            right_distance: 0,
            left_distance: 1,
            rear_distance: i16::MAX,
            drive_mode: 1,
            drive_mode_2: 0,
        };

        let mut mock = MockTransport::new();
        mock.inject_read(&frame.encode(FrameFormat::Standard));

        let decoded = SensorFrame::decode(&mut mock, FrameFormat::Standard).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_sensor_round_trip_extended() {
        let frame = SensorFrame {
            wheel_speed: 10,
            imu_angle: -300,
            right_distance: 2500,
            left_distance: -2500,
            rear_distance: 77,
            drive_mode: 0,
            drive_mode_2: 1,
        };

        let mut mock = MockTransport::new();
        mock.inject_read(&frame.encode(FrameFormat::Extended));

        let decoded = SensorFrame::decode(&mut mock, FrameFormat::Extended).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_sensor_framed_record_after_sync() {
        let frame = SensorFrame {
            wheel_speed: 10,
            imu_angle: 5,
            right_distance: 100,
            left_distance: 100,
            rear_distance: 100,
            drive_mode: 1,
            drive_mode_2: 0,
        };

        let mut mock = MockTransport::new();
        mock.inject_read(&frame.encode_with_sync(FrameFormat::Standard));

        sync(&mut mock, Duration::from_millis(10)).unwrap();
        let decoded = SensorFrame::decode(&mut mock, FrameFormat::Standard).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_actuator_round_trip() {
        let frame = ActuatorFrame {
            motor_output: -100,
            steer_output: 180,
            fifth_output: i16::MIN,
        };

        let wire = frame.encode_with_sync();
        assert_eq!(wire.len(), 8);
        assert_eq!(&wire[0..2], &SYNC_SENTINEL.to_le_bytes());

        let mut mock = MockTransport::new();
        mock.inject_read(&wire);

        sync(&mut mock, Duration::from_millis(10)).unwrap();
        let decoded = ActuatorFrame::decode(&mut mock).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_short_read_reports_error() {
        let mut mock = MockTransport::new();
        mock.inject_read(&[0x01]); // half a field, then silence

        let err = read_i16(&mut mock).unwrap_err();
        assert!(matches!(err, Error::ShortRead { expected: 2, actual: 1 }));
    }
}
