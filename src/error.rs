#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("Invalid event type: {found}.")]
    InvalidEventType { found: String },

    #[error("Event dispatcher is not initialized.")]
    NotInitialized,

    /// Error returned by a handler, passed through unchanged.
    #[error(transparent)]
    HandlerFailed(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("Missing config with key \"{key}\"")]
    MissingConfig { key: String },

    #[error("Configuration error: {msg}")]
    ConfigurationError { msg: String },
}
