use thiserror::Error;

#[derive(Debug, Error)]
pub enum LokiError {
    #[error("Invalid Loki URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("basic auth should be in login:password format")]
    BasicAuth,

    #[error("max errors should be 0..N, -1 to ignore errors")]
    MaxErrors,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Loki client must be created from within a tokio runtime")]
    NoRuntime,
}
