use reqwest::StatusCode;

/// Errors returned by the [`Builder`](crate::logger::Builder) and the [`Logger`](crate::logger::Logger)
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No API key was configured. Raised by [`build()`](crate::logger::Builder::build), never
    /// by a delivery.
    #[error("missing Datadog API key")]
    MissingApiKey,
    /// The configured base URL and base path do not combine into a valid URL.
    #[error("invalid intake endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
    /// The log record could not be serialized. The record is not delivered.
    #[error("could not format log record: {0}")]
    Format(#[from] slog::Error),
    /// The request could not be made at all (DNS failure, connection refused). Not retried.
    #[error("could not reach the Datadog intake API: {source}")]
    Transport { source: reqwest::Error },
    /// The intake API kept answering outside the 2xx range after all retries.
    #[error("Datadog intake API rejected the log entry. HTTP status code: '{status}', body: '{body}'")]
    Rejected { status: StatusCode, body: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport { source: err }
    }
}
