/// Errors from the Prometheus HTTP API client.
#[derive(Debug, thiserror::Error)]
pub enum PromError {
    /// Transport-level failure (connect, timeout, TLS, non-2xx status).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with `status: "error"`.
    #[error("Prometheus API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    /// The response envelope decoded, but its `resultType` does not match
    /// the query kind (e.g. a matrix from an instant query).
    #[error("Unexpected result type: {0}")]
    UnexpectedResultType(String),

    /// The response body did not match the expected envelope shape.
    #[error("Malformed API response: {0}")]
    Decode(#[from] serde_json::Error),
}
