//! Error types for API requests

use std::fmt;
use std::time::Duration;

/// Fixed set of outcomes a non-2xx response can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Request data
    NoPocketFound,
    BicIbanMismatch,
    InvalidPhoneNumber,
    MissingFields,
    CounterpartyAddressRequired,
    CounterpartyAlreadyExists,
    // Transaction
    InsufficientBalance,
    // HTTP 4xx
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    RequestConflict,
    TooManyRequests,
    // Server
    InternalServerError,
    ServiceUnavailable,
    /// Unmapped status, or a mapped status whose message matched no rule.
    GenericHttpError,
}

/// Grouping of [`ErrorKind`]s by what the caller can do about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    Http4xx,
    /// The request payload was invalid.
    RequestData,
    /// Business-rule rejection.
    Transaction,
    Server,
    Generic,
}

impl ErrorKind {
    pub fn family(self) -> ErrorFamily {
        use ErrorKind::*;
        match self {
            NoPocketFound | BicIbanMismatch | InvalidPhoneNumber | MissingFields
            | CounterpartyAddressRequired | CounterpartyAlreadyExists => ErrorFamily::RequestData,
            InsufficientBalance => ErrorFamily::Transaction,
            Unauthorized | Forbidden | NotFound | MethodNotAllowed | NotAcceptable
            | RequestConflict | TooManyRequests => ErrorFamily::Http4xx,
            InternalServerError | ServiceUnavailable => ErrorFamily::Server,
            GenericHttpError => ErrorFamily::Generic,
        }
    }

    /// Whether the same request may succeed later. This crate never retries on
    /// its own.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::TooManyRequests
                | ErrorKind::InternalServerError
                | ErrorKind::ServiceUnavailable
        )
    }

    /// Stable snake_case name, used as a metrics label.
    pub fn as_str(self) -> &'static str {
        use ErrorKind::*;
        match self {
            NoPocketFound => "no_pocket_found",
            BicIbanMismatch => "bic_iban_mismatch",
            InvalidPhoneNumber => "invalid_phone_number",
            MissingFields => "missing_fields",
            CounterpartyAddressRequired => "counterparty_address_required",
            CounterpartyAlreadyExists => "counterparty_already_exists",
            InsufficientBalance => "insufficient_balance",
            Unauthorized => "unauthorized",
            Forbidden => "forbidden",
            NotFound => "not_found",
            MethodNotAllowed => "method_not_allowed",
            NotAcceptable => "not_acceptable",
            RequestConflict => "request_conflict",
            TooManyRequests => "too_many_requests",
            InternalServerError => "internal_server_error",
            ServiceUnavailable => "service_unavailable",
            GenericHttpError => "generic_http_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified non-2xx response. The kind never changes after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status_code: Option<u16>,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{} (HTTP {status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Errors from request execution and the resource clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API answered with a non-2xx status.
    #[error("API error: {0}")]
    Api(ApiError),

    /// The session could not produce a token.
    #[error(transparent)]
    Auth(#[from] revolut_auth::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure; no HTTP status was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed body or a response that doesn't match the model.
    #[error("decode error: {0}")]
    Decode(String),

    /// Rejected before any request was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Classified kind, when the failure came from an HTTP response.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api(api) => Some(api.kind),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api(api) => api.status_code,
            _ => None,
        }
    }
}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Error::Api(error)
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_group_kinds() {
        assert_eq!(ErrorKind::MissingFields.family(), ErrorFamily::RequestData);
        assert_eq!(ErrorKind::NoPocketFound.family(), ErrorFamily::RequestData);
        assert_eq!(ErrorKind::InsufficientBalance.family(), ErrorFamily::Transaction);
        assert_eq!(ErrorKind::TooManyRequests.family(), ErrorFamily::Http4xx);
        assert_eq!(ErrorKind::ServiceUnavailable.family(), ErrorFamily::Server);
        assert_eq!(ErrorKind::GenericHttpError.family(), ErrorFamily::Generic);
    }

    #[test]
    fn only_rate_limit_and_server_errors_are_retryable() {
        assert!(ErrorKind::TooManyRequests.is_retryable());
        assert!(ErrorKind::InternalServerError.is_retryable());
        assert!(ErrorKind::ServiceUnavailable.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::InsufficientBalance.is_retryable());
        assert!(!ErrorKind::GenericHttpError.is_retryable());
    }

    #[test]
    fn api_error_display() {
        let err = Error::Api(ApiError {
            status_code: Some(404),
            kind: ErrorKind::NotFound,
            message: "not found".into(),
        });
        assert_eq!(err.to_string(), "API error: not_found (HTTP 404): not found");
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn auth_errors_pass_through() {
        let err: Error = revolut_auth::Error::Configuration("bad prefix".into()).into();
        assert_eq!(err.to_string(), "configuration error: bad prefix");
        assert_eq!(err.kind(), None);
    }
}
