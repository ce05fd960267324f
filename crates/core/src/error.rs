/// Result alias that carries the custom [`BeatCoachError`] type.
pub type Result<T> = std::result::Result<T, BeatCoachError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatCoachError {
    /// Free-form error used for conditions that do not warrant a dedicated
    /// variant, such as a missing collaborator at startup.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Raised when a configuration file cannot be parsed.
    #[error("{0}")]
    Config(#[from] serde_json::Error),
    /// Raised when a caller hands the core a value it cannot work with.
    #[error("{0}")]
    InvalidInput(&'static str),
}

impl BeatCoachError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for BeatCoachError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatCoachError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
