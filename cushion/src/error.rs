use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Word pool must contain at least one word")]
    EmptyWordPool,

    #[error("Word pool holds {0} words, more than a generator can index")]
    WordPoolTooLarge(usize),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "http")]
    #[error("Invalid database URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Unable to connect: {0}")]
    Connect(String),

    #[error("Request issued on a closed connection")]
    Closed,

    #[error("Close completion was dropped before the channel was released")]
    CloseAborted,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Completion counter is already at zero")]
    Underflow,
}
