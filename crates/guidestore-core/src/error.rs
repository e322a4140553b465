// Error taxonomy for the storefront API.
//
// `ErrorCode` is the stable, machine-readable code surfaced to clients.
// `ApiError` pairs a code with an HTTP status; `StoreError` is the internal
// error type that everything below the HTTP layer returns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable error codes returned in API error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GuideNotFound,
    GuideNotPurchasable,
    EmptyCart,
    InvalidEmail,
    InvalidPlan,
    PurchaseNotFound,
    FeedbackNotFound,
    GuideRequestNotFound,
    InvalidAccessToken,
    SubscriptionNotFound,
    SubscriptionAlreadyLinked,
    InvalidAdminCredentials,
    AdminSessionExpired,
    InvalidCsrfToken,
    Unauthorized,
    WebhookSignatureInvalid,
    CouldNotParseBody,
    RateLimitExceeded,
    CheckoutFailed,
    InternalServerError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::GuideNotFound => "Guide not found",
            Self::GuideNotPurchasable => "Guide is not available for purchase",
            Self::EmptyCart => "No guides selected",
            Self::InvalidEmail => "Invalid email address",
            Self::InvalidPlan => "Invalid subscription plan",
            Self::PurchaseNotFound => "Purchase not found",
            Self::FeedbackNotFound => "Feedback not found",
            Self::GuideRequestNotFound => "Guide request not found",
            Self::InvalidAccessToken => "Invalid access token",
            Self::SubscriptionNotFound => "Subscription not found",
            Self::SubscriptionAlreadyLinked => "Subscription is linked to another account",
            Self::InvalidAdminCredentials => "Invalid admin credentials",
            Self::AdminSessionExpired => "Admin session expired",
            Self::InvalidCsrfToken => "Invalid CSRF token",
            Self::Unauthorized => "Unauthorized",
            Self::WebhookSignatureInvalid => "Webhook signature verification failed",
            Self::CouldNotParseBody => "Could not parse body",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::CheckoutFailed => "Failed to create checkout session",
            Self::InternalServerError => "Internal server error",
        };
        write!(f, "{msg}")
    }
}

/// HTTP status codes used by the API error system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    TooManyRequests = 429,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn status_code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// API error carrying an HTTP status, an error code, and a human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status} {code}: {message}")]
pub struct ApiError {
    pub status: HttpStatus,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: HttpStatus, code: ErrorCode) -> Self {
        Self {
            message: code.to_string(),
            status,
            code,
        }
    }

    pub fn with_message(status: HttpStatus, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: ErrorCode) -> Self {
        Self::new(HttpStatus::BadRequest, code)
    }

    pub fn unauthorized(code: ErrorCode) -> Self {
        Self::new(HttpStatus::Unauthorized, code)
    }

    pub fn forbidden(code: ErrorCode) -> Self {
        Self::new(HttpStatus::Forbidden, code)
    }

    pub fn not_found(code: ErrorCode) -> Self {
        Self::new(HttpStatus::NotFound, code)
    }

    pub fn conflict(code: ErrorCode) -> Self {
        Self::new(HttpStatus::Conflict, code)
    }

    pub fn too_many_requests() -> Self {
        Self::new(HttpStatus::TooManyRequests, ErrorCode::RateLimitExceeded)
    }

    pub fn internal(code: ErrorCode) -> Self {
        Self::new(HttpStatus::InternalServerError, code)
    }

    /// Build the JSON body for the error response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "status": self.status.status_code(),
            }
        })
    }
}

/// Internal (non-HTTP) error used below the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl StoreError {
    /// Map this error to the `ApiError` surfaced to clients.
    ///
    /// Upstream/internal failures collapse to a generic 500; the detail stays
    /// server-side for logging.
    pub fn into_api_error(self) -> ApiError {
        match self {
            Self::Api(e) => e,
            other => {
                tracing::error!(error = %other, "internal error");
                ApiError::internal(ErrorCode::InternalServerError)
            }
        }
    }
}

/// Unified result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::WebhookSignatureInvalid).unwrap();
        assert_eq!(json, "\"WEBHOOK_SIGNATURE_INVALID\"");
    }

    #[test]
    fn api_error_json_body() {
        let err = ApiError::conflict(ErrorCode::SubscriptionAlreadyLinked);
        let body = err.to_json();
        assert_eq!(body["error"]["status"], 409);
        assert_eq!(body["error"]["code"], "SUBSCRIPTION_ALREADY_LINKED");
    }

    #[test]
    fn store_error_collapses_to_internal() {
        let api = StoreError::Database("boom".into()).into_api_error();
        assert_eq!(api.status, HttpStatus::InternalServerError);
        assert_eq!(api.code, ErrorCode::InternalServerError);
    }

    #[test]
    fn store_error_preserves_api_errors() {
        let api = StoreError::Api(ApiError::too_many_requests()).into_api_error();
        assert_eq!(api.status, HttpStatus::TooManyRequests);
    }
}
