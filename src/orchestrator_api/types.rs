use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic message used when an error body carries nothing useful
pub(crate) const UNKNOWN_ERROR_MESSAGE: &str = "No error message returned by server";

/// Maximum length of a raw (non-JSON) error body kept in an error message
const MAX_RAW_MESSAGE_LEN: usize = 200;

/// Orchestrator API error type
///
/// Represents all possible errors that can occur when interacting with
/// the Orchestrator API or preparing a session.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Operation invoked before authentication, or a required setting is missing.
    /// Never reaches the network.
    Precondition(String),
    /// Either authentication flow returned something other than HTTP 200
    Authentication { status: u16, message: String },
    /// A lookup succeeded (HTTP 200) but matched nothing
    NotFound(String),
    /// A lookup matched more than one element under `MatchPolicy::Unique`
    Ambiguous { name: String, count: usize },
    /// Response status differed from the operation's success code
    Server { status: u16, message: String },
    /// Transport, request building or response decoding failed
    Api(ApiError),
    /// Configuration error
    Config(String),
}

impl OrchestratorError {
    /// HTTP status code attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            OrchestratorError::Authentication { status, .. }
            | OrchestratorError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error was raised locally, before any request was sent
    pub fn is_precondition(&self) -> bool {
        matches!(self, OrchestratorError::Precondition(_))
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::Precondition(msg) => write!(f, "Precondition failed: {}", msg),
            OrchestratorError::Authentication { status, message } => {
                write!(f, "Authentication failed: HTTP {}: {}", status, message)
            }
            OrchestratorError::NotFound(msg) => write!(f, "Not found: {}", msg),
            OrchestratorError::Ambiguous { name, count } => write!(
                f,
                "Ambiguous match: {} elements match '{}', expected exactly one",
                count, name
            ),
            OrchestratorError::Server { status, message } => {
                write!(f, "Server error: HTTP {}: {}", status, message)
            }
            OrchestratorError::Api(err) => write!(f, "API error: {}", err),
            OrchestratorError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrchestratorError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for OrchestratorError {
    fn from(err: ApiError) -> Self {
        OrchestratorError::Api(err)
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::Api(ApiError::from(err))
    }
}

/// Transport-level errors
#[derive(Debug)]
pub enum ApiError {
    /// Network error (connection, timeout, etc.)
    Network(String),
    /// Failed to parse response
    Parse(String),
    /// Request building failed
    Request(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ApiError::Request(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timeout".to_string())
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Error envelope shapes returned by the Orchestrator and the cloud identity service
///
/// Orchestrator: `{"message": "...", "errorCode": 1015}`
/// OData: `{"error": {"code": "...", "message": "..."}}`
/// OAuth: `{"error": "invalid_grant", "error_description": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorField>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Code(String),
    Detail {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Best-effort extraction of a human readable message from an error body
///
/// Never fails: bodies that are empty, unparseable or lack a known message
/// field degrade to the raw text or a generic message.
pub(crate) fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return UNKNOWN_ERROR_MESSAGE.to_string();
    }

    match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(parsed) => {
            let (detail, code) = match parsed.error {
                Some(ErrorField::Detail { message }) => (message, None),
                Some(ErrorField::Code(code)) => (None, Some(code)),
                None => (None, None),
            };

            let non_blank = |m: Option<String>| m.filter(|m| !m.trim().is_empty());

            non_blank(parsed.message)
                .or_else(|| non_blank(detail))
                .or_else(|| non_blank(parsed.error_description))
                .or_else(|| non_blank(code))
                .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string())
        }
        // A JSON value that is not an object (array, number) carries no message
        Err(_) if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() => {
            UNKNOWN_ERROR_MESSAGE.to_string()
        }
        Err(_) => {
            let mut raw: String = trimmed.chars().take(MAX_RAW_MESSAGE_LEN).collect();
            if trimmed.chars().count() > MAX_RAW_MESSAGE_LEN {
                raw.push_str("...");
            }
            raw
        }
    }
}

/// OData collection envelope (`{"@odata.context": "...", "value": [...]}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ODataCollection<T> {
    #[serde(rename = "@odata.context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@odata.count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Token envelope returned by either authentication flow
///
/// On-premise responses carry `result`; the cloud identity service answers
/// with an OAuth `access_token`. Both are accepted regardless of mode.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<f64>,
}

impl TokenResponse {
    /// The bearer token, preferring the OAuth field
    pub fn into_token(self) -> Option<String> {
        self.access_token
            .or(self.result)
            .filter(|token| !token.is_empty())
    }
}
