use thiserror::Error;

/// Errors from a single API request.
///
/// The feed controller does not branch on the kind; `is_retryable` is only
/// used by the client's own retry loop.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Insecure base URL: HTTPS required (except localhost)")]
    InsecureBaseUrl,
    /// The server answered with a page that does not extend the loaded run.
    #[error("Server returned page {got} when asked for page {requested}")]
    UnexpectedPage { requested: u32, got: u32 },
}

impl FetchError {
    /// Returns true if this error is transient and the request should be retried.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::HttpStatus(status) => *status >= 500,
            FetchError::ResponseTooLarge(_)
            | FetchError::Decode(_)
            | FetchError::InvalidUrl
            | FetchError::InsecureBaseUrl
            | FetchError::UnexpectedPage { .. } => false,
        }
    }
}
