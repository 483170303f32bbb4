use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid database URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Connection count must be positive")]
    NoConnections,

    #[error("Documents per bulk insert must be positive")]
    EmptyBulkInsert,

    #[error("Benchmark setup failed: {0}")]
    Setup(#[from] cushion::error::ConnectionError),

    #[error("Unable to serialize statistics: {0}")]
    Output(serde_json::Error),
}
