use thiserror::Error;

#[derive(Error, Debug)]
pub enum VsdxTranslatorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("XML read error: {0}")]
    XmlReadError(#[from] xml::reader::Error),

    #[error("XML write error: {0}")]
    XmlWriteError(#[from] xml::writer::Error),

    #[error("Invalid diagram: {0}")]
    InvalidDiagram(String),

    #[error("Shape {shape} on page {page} has no text element")]
    NoTextElement { page: usize, shape: usize },

    #[error("Shape not found: page {page}, shape {shape}")]
    ShapeNotFound { page: usize, shape: usize },

    #[error("Credentials error: {0}")]
    CredentialsError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("A translation is already running in session {0}")]
    JobInProgress(String),
}

pub type Result<T> = std::result::Result<T, VsdxTranslatorError>;

/// Coarse grouping used to decide how far a failure reaches: credential
/// failures stop everything, document and translation failures stop one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Credentials,
    Document,
    Translation,
    Io,
    Config,
    Session,
}

impl VsdxTranslatorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VsdxTranslatorError::CredentialsError(_)
            | VsdxTranslatorError::AuthError(_)
            | VsdxTranslatorError::JwtError(_) => ErrorCategory::Credentials,
            VsdxTranslatorError::ZipError(_)
            | VsdxTranslatorError::XmlReadError(_)
            | VsdxTranslatorError::XmlWriteError(_)
            | VsdxTranslatorError::InvalidDiagram(_)
            | VsdxTranslatorError::NoTextElement { .. }
            | VsdxTranslatorError::ShapeNotFound { .. } => ErrorCategory::Document,
            VsdxTranslatorError::ApiError(_)
            | VsdxTranslatorError::HttpError(_)
            | VsdxTranslatorError::JsonError(_) => ErrorCategory::Translation,
            VsdxTranslatorError::IoError(_) => ErrorCategory::Io,
            VsdxTranslatorError::ConfigError(_) | VsdxTranslatorError::UnsupportedLanguage(_) => {
                ErrorCategory::Config
            }
            VsdxTranslatorError::SessionNotFound(_) | VsdxTranslatorError::JobInProgress(_) => {
                ErrorCategory::Session
            }
        }
    }

    /// Whether the failure makes every remaining file in a batch pointless.
    pub fn aborts_batch(&self) -> bool {
        self.category() == ErrorCategory::Credentials
    }
}
