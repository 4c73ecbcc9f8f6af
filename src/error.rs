use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Backend unreachable, timed out, or the body could not be read.
    #[error("Connection error: {0}")]
    Transport(String),

    #[error("API error ({endpoint}): {message}")]
    Api {
        endpoint: String,
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited by {endpoint}")]
    RateLimit {
        endpoint: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Malformed record #{index} ({field}): {reason}")]
    MalformedRecord {
        index: usize,
        field: String,
        reason: String,
    },

    #[error("Could not determine an industry: {0}")]
    Classification(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(String),
}

impl Error {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn api_with_status(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn malformed(index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether a manual retry of the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimit { .. } => true,
            Self::Api {
                status_code: Some(code),
                ..
            } => *code >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
