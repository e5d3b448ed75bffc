//! Steering servo passthrough with clamp-to-straight fallback

/// Centered steering angle
pub const STRAIGHT: i16 = 90;

/// Lowest valid steering angle
const MIN_ANGLE: i16 = 0;

/// Highest valid steering angle
const MAX_ANGLE: i16 = 180;

/// Steering angle passthrough
///
/// Remembers the last angle actually commanded so redundant hardware
/// writes are suppressed. An out-of-range request always forces the
/// straight position; the safety fallback is never suppressed.
#[derive(Debug, Default)]
pub struct SteerServo {
    last_commanded: Option<i16>,
}

impl SteerServo {
    /// Create a servo with no commanded angle yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one steering request
    ///
    /// Returns `Some(angle)` when a hardware write should be issued with
    /// that angle, `None` when the request matches the last commanded
    /// value and no write is needed.
    pub fn command(&mut self, angle: i16) -> Option<i16> {
        if !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
            log::debug!("Steering: {} out of range, forcing straight", angle);
            self.last_commanded = Some(STRAIGHT);
            return Some(STRAIGHT);
        }

        if self.last_commanded == Some(angle) {
            return None;
        }

        self.last_commanded = Some(angle);
        Some(angle)
    }

    /// Last angle written to the servo, if any
    pub fn last_commanded(&self) -> Option<i16> {
        self.last_commanded
    }
}
