use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeskError>;

#[derive(Debug, Error)]
pub enum DeskError {
    /// Rejected before any network call; local state is untouched.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },
    #[error("not signed in as an admin")]
    Unauthorized,
    #[error("config error: {0}")]
    Config(String),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cancelled")]
    Cancelled,
}

impl DeskError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeskError::Validation(message.into())
    }

    pub fn invoice_not_found(key: impl Into<String>) -> Self {
        DeskError::NotFound { kind: "invoice", key: key.into() }
    }

    pub fn quote_not_found(key: impl Into<String>) -> Self {
        DeskError::NotFound { kind: "quote", key: key.into() }
    }
}
