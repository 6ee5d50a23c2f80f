//! Shared error-class taxonomy (spec.md §4.11, §7).
//!
//! Every error in the workspace is classifiable into one of five buckets so
//! the retry core and the top-level unhandled-failure handler can make
//! policy decisions without downcasting on message text.

use std::fmt;

/// Error classification used by the retry core and the top-level handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Unrecoverable — the process should exit.
    Fatal,
    /// Operator must fix configuration or credentials.
    Config,
    /// Retry may help (network blips, 5xx, rate limits).
    Transient,
    /// Expected cancellation (shutdown, user-cancelled wait).
    Abort,
    /// Everything else; surfaced and the process exits at the top level.
    Unknown,
}

impl ErrorClass {
    /// Whether the top-level unhandled-failure handler should exit the
    /// process for an error of this class (§4.11).
    pub fn should_exit_process(self) -> bool {
        matches!(self, ErrorClass::Fatal | ErrorClass::Config | ErrorClass::Unknown)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Fatal => "fatal",
            ErrorClass::Config => "config",
            ErrorClass::Transient => "transient",
            ErrorClass::Abort => "abort",
            ErrorClass::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Implemented by every error type in the workspace so callers can classify
/// without knowing the concrete error type.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Classify a raw transport-level error message using the transient-network
/// vocabulary from spec.md §4.11 (ECONN*, ETIMEDOUT, DNS temp failures).
pub fn classify_io_message(msg: &str) -> ErrorClass {
    const TRANSIENT_NEEDLES: &[&str] = &[
        "econnreset",
        "econnrefused",
        "econnaborted",
        "etimedout",
        "enotfound",
        "eai_again",
        "timed out",
        "connection reset",
        "connection refused",
        "dns",
        "temporarily unavailable",
    ];
    let lower = msg.to_ascii_lowercase();
    if TRANSIENT_NEEDLES.iter().any(|needle| lower.contains(needle)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Unknown
    }
}

/// Classify an HTTP status code per the retryable set in spec.md §4.11.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}
