use std::error::Error as StdError;
use std::fmt;

/// Errors surfaced to code calling through `ApiClient`
#[derive(Debug)]
pub enum ClientError {
    /// The request never produced a response
    Network(reqwest::Error),
    /// Non-OK response; `message` is the server's `error` field or a generic fallback
    Api { status: u16, message: String },
    /// Refresh failed; the session has been cleared
    SessionExpired,
    Decode(String),
    Storage(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Network(e) => write!(f, "Network error: {}", e),
            ClientError::Api { message, .. } => write!(f, "{}", message),
            ClientError::SessionExpired => write!(f, "Session expired. Please log in again."),
            ClientError::Decode(msg) => write!(f, "Unexpected response: {}", msg),
            ClientError::Storage(msg) => write!(f, "Session storage error: {}", msg),
        }
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ClientError::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err)
    }
}
