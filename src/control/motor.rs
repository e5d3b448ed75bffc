//! Motor output scaling and the dead-man stop controller

/// Motor output corresponding to zero torque
const MOTOR_STOP: f32 = 90.0;

/// Hardware-imposed minimum drive signal
const MOTOR_FLOOR: i16 = 35;

/// Proportional gain of the stop controller
const KP: f32 = 1.0;

/// Integral gain of the stop controller
const KI: f32 = 0.05;

/// Saturation ceiling for the accumulated integral error
const SAT_ERROR: i32 = 1000;

/// Longest time step accepted into integral accumulation, in millis
const MAX_TIME_STEP_MS: i16 = 500;

/// Maximum expected wheel speed error
const WHEEL_SPEED_RANGE: f32 = 1000.0;

/// Span of the motor output range
const MOTOR_RANGE: f32 = 180.0;

/// Scale a command in [-100, 100] to the [0, 180] range the motor driver
/// expects
///
/// Out-of-range input is clamped, not rejected. The result is floored at
/// the hardware's minimum drive signal.
pub fn scale_motor_output(raw: i16) -> i16 {
    let clamped = raw.clamp(-100, 100);
    let scaled = (0.9 * f32::from(clamped) + 90.0) as i16;
    scaled.max(MOTOR_FLOOR)
}

/// PI controller that drives wheel speed to zero when the dead-man switch
/// is released
///
/// Owns the accumulated integral error explicitly so multiple controllers
/// can exist side by side (one per simulated truck, one per test).
#[derive(Debug, Default)]
pub struct MotorController {
    /// Accumulated error for integral control; saturated at ±SAT_ERROR
    error_sum: i32,
}

impl MotorController {
    /// Create a controller with a zeroed accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// One stop-loop iteration: returns the motor output that decelerates
    /// the truck toward zero wheel speed
    ///
    /// `time_step_ms` is the elapsed time since the previous iteration.
    /// Steps outside (0, 500] ms are excluded from integral accumulation
    /// so a stalled scheduler cannot wind the accumulator up in one jump.
    pub fn stop_motor(&mut self, wheel_speed: i16, time_step_ms: i16) -> i16 {
        let error = i32::from(-wheel_speed);

        if self.error_sum < SAT_ERROR && time_step_ms > 0 && time_step_ms <= MAX_TIME_STEP_MS {
            self.error_sum += i32::from(time_step_ms) * error;
            // Saturate both directions; windup in either sign causes
            // overshoot once the truck actually stops
            self.error_sum = self.error_sum.clamp(-SAT_ERROR, SAT_ERROR);
        }

        let error_range = KI * SAT_ERROR as f32 + KP * WHEEL_SPEED_RANGE;
        let output = (KP * error as f32 + KI * self.error_sum as f32) * (MOTOR_RANGE / error_range)
            + MOTOR_STOP;

        output as i16
    }

    /// Current integral accumulator value
    pub fn error_sum(&self) -> i32 {
        self.error_sum
    }

    /// Explicit domain reset of the accumulator
    pub fn reset(&mut self) {
        self.error_sum = 0;
    }
}
