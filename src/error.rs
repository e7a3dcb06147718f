use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Retryable failure. Only escapes the retry loop as `ProviderUnavailable`.
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Provider unavailable after {attempts} attempt(s): {message}")]
    ProviderUnavailable { attempts: u32, message: String },

    #[error("Request rejected by {provider} ({status_code}): {message}")]
    Rejected {
        provider: String,
        status_code: u16,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Thinking model not found: {0}")]
    ModelNotFound(String),

    #[error("Model file error ({path}): {message}")]
    ModelFile { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(String),
}

/// Machine-readable failure tag carried to the CLI and web callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ConfigurationError,
    ProviderUnavailable,
    RequestRejected,
    InvalidResponse,
    ModelNotFound,
    ModelFile,
    Io,
    Template,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidInput => "invalid_input",
            Self::ConfigurationError => "configuration_error",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::RequestRejected => "request_rejected",
            Self::InvalidResponse => "invalid_response",
            Self::ModelNotFound => "model_not_found",
            Self::ModelFile => "model_file",
            Self::Io => "io",
            Self::Template => "template",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn model_not_found(id: impl Into<String>) -> Self {
        Self::ModelNotFound(id.into())
    }

    pub fn model_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelFile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn rejected(
        provider: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            provider: provider.into(),
            status_code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Config(_) => ErrorKind::ConfigurationError,
            // A transient error that leaks out is reported the same way as exhaustion.
            Self::Transient(_) | Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::Rejected { .. } => ErrorKind::RequestRejected,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::ModelNotFound(_) => ErrorKind::ModelNotFound,
            Self::ModelFile { .. } => ErrorKind::ModelFile,
            Self::Io(_) => ErrorKind::Io,
            Self::Template(_) => ErrorKind::Template,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Serializable failure report: what the web transport and JSON output carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
}

impl From<&Error> for ErrorReport {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind(),
            detail: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
