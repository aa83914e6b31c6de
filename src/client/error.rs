use thiserror::Error;

/// Failure classification for outbound reads.
///
/// Only [`FetchError::Transient`] is retried; everything else surfaces to the
/// caller on the first attempt. [`FetchError::Unreachable`] is produced by the
/// retry wrapper once the attempt ceiling is hit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Rejected by the server (4xx other than 429); treat as a user/input problem
    #[error("request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    /// HTTP 429; surfaced as-is instead of silently retrying against a server
    /// that is already pushing back
    #[error("rate limited by the server{}", retry_after_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Network error, timeout or 5xx; eligible for retry
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Response arrived but could not be decoded; not retried
    #[error("unusable response: {message}")]
    Decode { message: String },

    /// All retry attempts exhausted; suggest trying again later
    #[error("service unreachable after {attempts} attempts: {last}")]
    Unreachable { attempts: u32, last: String },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient {
            message: message.into(),
        }
    }

    pub fn client(status: u16, message: impl Into<String>) -> Self {
        FetchError::Client {
            status,
            message: message.into(),
        }
    }

    /// Whether the retry wrapper may schedule another attempt for this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

fn retry_after_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry in ~{secs}s"),
        None => String::new(),
    }
}
