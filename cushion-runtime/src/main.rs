use cushion_runtime::CushionRuntime;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cushion=info")),
        )
        .init();

    let res = match CushionRuntime::new().with_args() {
        Ok(runtime) => runtime.run().await.map(|_| ()),
        Err(err) => Err(err),
    };

    if let Err(err) = res {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
