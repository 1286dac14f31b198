use thiserror::Error;

/// Why a single source failed to produce a reading.
///
/// These never abort a run: every variant ends up inside the `error` field of
/// the failing source's [`WeatherReading`](crate::WeatherReading).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Missing credential or unusable local setup, detected before any request.
    #[error("{0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("city {0:?} not found")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The source's worker stopped without handing back a reading.
    #[error("worker stopped without a reading")]
    WorkerLost,
}

impl FetchError {
    pub fn missing_api_key() -> Self {
        FetchError::Configuration("API key required".to_string())
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, FetchError::Cancelled | FetchError::DeadlineExceeded)
    }

    /// Maps a reqwest failure without its URL, which may hold an API key.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            FetchError::Network("request timed out".to_string())
        } else if err.is_connect() {
            FetchError::Network("connection failed".to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_naturally() {
        assert_eq!(FetchError::missing_api_key().to_string(), "API key required");
    }

    #[test]
    fn only_cancel_and_deadline_are_cancellations() {
        assert!(FetchError::Cancelled.is_cancellation());
        assert!(FetchError::DeadlineExceeded.is_cancellation());
        assert!(!FetchError::Network("reset".into()).is_cancellation());
        assert!(!FetchError::NotFound("Atlantis".into()).is_cancellation());
        assert!(!FetchError::WorkerLost.is_cancellation());
    }

    #[test]
    fn upstream_error_shows_status() {
        let err = FetchError::Upstream { status: 401, body: "invalid key".into() };
        assert_eq!(err.to_string(), "HTTP 401: invalid key");
    }
}
