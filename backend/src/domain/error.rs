//! Errors surfaced by dispatch operations.
//!
//! Every failed store call yields one [`Error`]: a category the presentation
//! layer can branch on, the message shown to the operator, and optional
//! structured details (the order and statuses of a rejected transition, or
//! how many assignments a failed cascade left behind).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ports::GatewayError;

/// Failure category of a dispatch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Input failed validation, or the gateway rejected the request.
    InvalidRequest,
    /// The viewer's role does not permit the action.
    Forbidden,
    /// The referenced order or user is not in the canonical collection.
    NotFound,
    /// The requested status transition is not allowed.
    Conflict,
    /// The gateway could not be reached or timed out.
    ServiceUnavailable,
    /// The gateway answered with something the store could not use.
    InternalError,
}

impl ErrorCode {
    /// Whether repeating the same call may succeed without changing input.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }

    fn fallback_message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "the request was rejected",
            Self::Forbidden => "this action is not available for your role",
            Self::NotFound => "the record no longer exists",
            Self::Conflict => "the order cannot move to that status",
            Self::ServiceUnavailable => "the dispatch service is unavailable",
            Self::InternalError => "the dispatch service returned an unexpected response",
        }
    }
}

/// Error reported by dispatch operations.
///
/// The message is never blank: an empty message is replaced with a generic
/// one for the code, so notices always have text to show.
///
/// # Examples
/// ```
/// use dispatch::domain::{Error, ErrorCode};
///
/// let err = Error::new(ErrorCode::NotFound, "  ");
/// assert_eq!(err.message(), "the record no longer exists");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            code.fallback_message().to_owned()
        } else {
            message
        };
        Self {
            code,
            message,
            details: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Message shown to the operator.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use dispatch::domain::{Error, ErrorCode};
    /// use serde_json::json;
    ///
    /// let err = Error::new(ErrorCode::Conflict, "pending cannot become completed")
    ///     .with_details(json!({ "orderId": "os-1" }));
    /// assert_eq!(err.details().unwrap()["orderId"], "os-1");
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Gateway rejections keep their message verbatim; it is what the operator
/// needs to read (for example a duplicate email on account creation).
impl From<GatewayError> for Error {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Connection { .. } | GatewayError::Timeout { .. } => {
                Self::service_unavailable(error.to_string())
            }
            GatewayError::Query { .. } | GatewayError::Decode { .. } => {
                Self::internal(error.to_string())
            }
            GatewayError::Rejected { message } => Self::invalid_request(message),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests;
