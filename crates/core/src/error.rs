/// Result alias that carries the custom [`LightControlError`] type.
pub type Result<T> = std::result::Result<T, LightControlError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LightControlError {
    /// A ramp or application setting cannot be used as given. Raised before
    /// any color is pushed to a sink.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The target sink refused a lock or a color write while a step was in
    /// flight.
    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),
    /// The lighting bridge could not be brought into a streamable state.
    #[error("bridge error: {0}")]
    Bridge(String),
    /// The video source could not be found, connected or read.
    #[error("video error: {0}")]
    Video(String),
    /// The interrupt handler could not be installed.
    #[error("signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
    /// Operator-facing failure raised by the console, such as input running
    /// out while a prompt waits.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration document.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LightControlError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn sink<T: Into<String>>(msg: T) -> Self {
        Self::SinkUnavailable(msg.into())
    }

    /// Returns `true` for errors raised by configuration validation.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
