use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("SLACK_USER_TOKEN environment variable not set")]
    MissingToken,

    #[error("invalid date or timestamp: {0}")]
    InvalidDate(String),

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from Slack: {body}")]
    Http { status: u16, body: String },

    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("malformed Slack response: missing key {0}")]
    MissingKey(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read file at {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file at {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonSerialize(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("{0}")]
    Usage(String),
}

impl AppError {
    /// True for a malformed response, false for a request Slack rejected.
    pub fn is_structural(&self) -> bool {
        matches!(self, AppError::MissingKey(_) | AppError::JsonParse(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
