use mock_service::MockDatabase;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=debug,tower_http=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("MOCK_SERVICE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3002".to_string())
        .parse()?;
    let failure_rate = match std::env::var("MOCK_SERVICE_FAILURE_RATE") {
        Ok(rate) => rate.parse()?,
        Err(_) => 0.,
    };

    mock_service::run(addr, Arc::new(MockDatabase::new().failure_rate(failure_rate))).await
}
