use hokm_server::{HokmServer, ServerError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("HOKM_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_owned());

    let server = HokmServer::builder().bind(addr).build().await?;
    server.run().await
}
