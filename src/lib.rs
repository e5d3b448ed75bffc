//! semi-link - Serial link and control loops for the model semi-truck
//!
//! This library provides the point-to-point synchronization protocol
//! spoken between the Pi-side node and the Teensy firmware, the frame
//! codecs, and the motor/steering control loops.

pub mod config;
pub mod control;
pub mod error;
pub mod link;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
