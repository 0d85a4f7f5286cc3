use docvault::{app, config::Config, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docvault=info,tower_http=info")),
        )
        .init();

    let state = AppState::from_config(&config)
        .await
        .expect("Failed to initialize storage");

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app(state)).await.expect("server");
}
