//! Closed-loop control functions for the truck's actuators
//!
//! These are total functions over their numeric domains: out-of-range
//! inputs are clamped to safe defaults rather than reported as errors,
//! because default-safe actuation beats halting on a moving vehicle.

mod motor;
mod steering;

pub use motor::{scale_motor_output, MotorController};
pub use steering::{SteerServo, STRAIGHT};
