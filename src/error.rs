//! Error types for the semi-truck link

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Link error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration serialize error
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// No sync sentinel observed before the scan deadline
    #[error("Link lost: no sync sentinel within {0} ms")]
    LinkLost(u64),

    /// Fewer bytes buffered than the codec was promised
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes the frame requires
        expected: usize,
        /// Bytes actually read
        actual: usize,
    },

    /// Actuator command channel closed
    #[error("Command channel disconnected")]
    Disconnected,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
