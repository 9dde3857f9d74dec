//! Error classification for non-2xx API responses
//!
//! Most statuses map to one kind outright. 400 and 422 are overloaded by the
//! API for several payload and business-rule failures, so for those the
//! message is searched for known phrases (case-insensitive substring match,
//! first rule wins). A 400 or 422 whose message matches nothing becomes
//! [`ErrorKind::GenericHttpError`].

use serde_json::Value;

use crate::error::{ApiError, ErrorKind};

/// Message used when the response carries none.
pub const NO_MESSAGE: &str = "No message supplied";

const BAD_REQUEST_PATTERNS: &[(&str, ErrorKind)] = &[
    ("no pocket found", ErrorKind::NoPocketFound),
    ("bic and iban does not match", ErrorKind::BicIbanMismatch),
    (
        "could not interpret numbers after plus-sign",
        ErrorKind::InvalidPhoneNumber,
    ),
    ("required fields are:", ErrorKind::MissingFields),
];

const UNPROCESSABLE_PATTERNS: &[(&str, ErrorKind)] = &[
    ("insufficient balance", ErrorKind::InsufficientBalance),
    ("address is required", ErrorKind::CounterpartyAddressRequired),
    ("counterparty already exists", ErrorKind::CounterpartyAlreadyExists),
];

fn match_patterns(message: &str, patterns: &[(&str, ErrorKind)]) -> Option<ErrorKind> {
    let lower = message.to_lowercase();
    patterns
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, kind)| *kind)
}

/// Pick the kind for a non-2xx status and its message.
pub fn classify(status: u16, message: &str) -> ErrorKind {
    let matched = match status {
        400 => match_patterns(message, BAD_REQUEST_PATTERNS),
        401 => Some(ErrorKind::Unauthorized),
        403 => Some(ErrorKind::Forbidden),
        404 => Some(ErrorKind::NotFound),
        405 => Some(ErrorKind::MethodNotAllowed),
        406 => Some(ErrorKind::NotAcceptable),
        409 => Some(ErrorKind::RequestConflict),
        422 => match_patterns(message, UNPROCESSABLE_PATTERNS),
        429 => Some(ErrorKind::TooManyRequests),
        500 => Some(ErrorKind::InternalServerError),
        503 => Some(ErrorKind::ServiceUnavailable),
        _ => None,
    };
    matched.unwrap_or(ErrorKind::GenericHttpError)
}

/// The `message` field of an error body, or [`NO_MESSAGE`].
pub fn error_message(body: Option<&Value>) -> String {
    body.and_then(|body| body.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or(NO_MESSAGE)
        .to_string()
}

/// Build the classified error for a response.
pub fn classify_response(status: u16, body: Option<&Value>) -> ApiError {
    let message = error_message(body);
    ApiError {
        status_code: Some(status),
        kind: classify(status, &message),
        message,
    }
}
