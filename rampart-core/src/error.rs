use thiserror::Error;

pub type RampartResult<T> = Result<T, RampartError>;

#[derive(Error, Debug)]
pub enum RampartError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Durable store error: {0}")]
    Storage(String),

    #[error("Platform call '{call}' failed: {detail}")]
    Platform { call: String, detail: String },

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RampartError {
    /// Shorthand for a failed call against the live platform.
    pub fn platform(call: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        RampartError::Platform { call: call.into(), detail: detail.to_string() }
    }
}
