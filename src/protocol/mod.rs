//! Sentinel-framed wire protocol shared with the Teensy firmware
//!
//! Every frame in either direction is preceded by a 2-byte little-endian
//! sync sentinel. All fields are signed 16-bit, little-endian, encoded and
//! decoded one field at a time so the wire image never depends on host
//! byte order or struct layout.

mod frames;
mod sync;

pub use frames::{ActuatorFrame, FrameFormat, SensorFrame};
pub use sync::sync;

/// Frame-start marker. Chosen outside the valid range of every sensor and
/// actuator field, so it can never occur as real data. Both endpoints must
/// use the same value; it is an assumption of this firmware pair, not a
/// negotiated constant.
pub const SYNC_SENTINEL: i16 = -32000;

/// Wire size of every field
pub const FIELD_SIZE: usize = 2;
