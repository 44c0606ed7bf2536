use thiserror::Error;

/// Why an upstream feed produced no records this cycle.
///
/// Never leaves the `feeds` module: `fetch_or_empty` logs it and substitutes
/// an empty list.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No API key was configured, so the request was not attempted.
    #[error("no API key configured")]
    MissingApiKey,

    /// The provider did not answer within the feed's time budget.
    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Connection, TLS or body-read failure.
    #[error("request failed: {0}")]
    Request(reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The body was not the JSON object we expected.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Classify a reqwest failure, pulling timeouts out into their own variant.
    pub fn from_reqwest(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                ms: timeout.as_millis() as u64,
            }
        } else {
            FetchError::Request(err)
        }
    }
}

/// A push to one subscriber failed. The subscriber is dropped from the registry.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("send timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_from_reqwest_classifies_timeouts() {
        // Accepts into the backlog but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let budget = Duration::from_millis(50);
        let client = reqwest::Client::builder().timeout(budget).build().unwrap();

        let err = client
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();
        let err = FetchError::from_reqwest(err, budget);
        assert!(matches!(err, FetchError::Timeout { ms: 50 }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_from_reqwest_keeps_connect_failures_as_request() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();
        let err = FetchError::from_reqwest(err, Duration::from_secs(1));
        assert!(matches!(err, FetchError::Request(_)), "{:?}", err);
    }
}
