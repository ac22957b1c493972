use axum::{routing::post, Router};
use const_env::from_env;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use merkle_airdrop::mini_tree_generator::create_mini_tree;

#[from_env]
const MINI_TREE_PORT: u16 = 4000;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Define the app with a route
    let app = Router::new().route("/", post(create_mini_tree));

    // Define the address to serve on
    let addr = SocketAddr::from(([0, 0, 0, 0], MINI_TREE_PORT));
    info!("mini tree server listening on {}", addr);

    // Start the server
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
