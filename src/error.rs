//! Error types for cloud-reload.

/// Result type alias for cloud-reload operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading, watching or rolling back configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration source could not be read (missing file, unreachable remote).
    #[error("Configuration source unavailable: {0}")]
    SourceUnavailable(String),

    /// The raw configuration content is malformed.
    #[error("Failed to parse configuration: {0}")]
    ParseFailure(String),

    /// The parsed configuration does not fit the target structure.
    #[error("Failed to map configuration onto target: {0}")]
    MappingFailure(String),

    /// The application callback declined a new configuration.
    #[error("Configuration change rejected by application")]
    CallbackRejection,

    /// The configuration request is incomplete or inconsistent.
    #[error("Invalid configuration request: {0}")]
    InvalidRequest(String),

    /// A change callback has already been registered for this session.
    #[error("A change callback is already registered for this session")]
    CallbackAlreadyRegistered,

    /// Change callbacks require dynamic reload to be enabled on the request.
    #[error("Dynamic reload is disabled for this session")]
    DynamicReloadDisabled,

    /// Watching a source failed or is already in progress.
    #[error("Watch error: {0}")]
    WatchError(String),

    /// The in-memory configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    SerializationError(String),

    /// A requested configuration key does not exist.
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// HTTP-equivalent status code for surfacing this error to a debug client.
    ///
    /// Missing keys and bad requests map to `400`, everything else to `500`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::KeyNotFound(_) | Self::InvalidRequest(_) => 400,
            _ => 500,
        }
    }

    /// Whether this error means the source itself could not be reached.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::IoError(_))
    }
}
