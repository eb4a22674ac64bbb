use anyhow::Result;

use talk_assistant::{config, server};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".parse().unwrap());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::Config::from_env()?;
    server::run(config).await
}
