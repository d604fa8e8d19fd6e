//! The HTTP side of parlor: the websocket gateway, uploads, and a few plain endpoints.

use std::net::{Ipv6Addr, SocketAddr};

use axum::{http::HeaderValue, routing::get, Json};
use log::{info, warn};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
};
use utoipa::ToSchema;

mod config;
mod context;
mod docs;
mod errors;
mod gateway;
mod protocol;
mod schemas;
mod serialized;
mod upload;
mod ws;

pub use config::*;
pub use context::*;
pub use errors::*;
pub use gateway::*;
pub use protocol::*;

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    status: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, body = Health)
    )
)]
async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Starts the parlor server
pub async fn run_server(context: ServerContext) -> std::io::Result<()> {
    let config = context.config.clone();
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();

    let origin = match config.client_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            warn!("Ignoring client url, allowing any origin: {}", e);
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let root_router = Router::new()
        .route("/health", get(health))
        .route("/api.json", get(docs::docs))
        .merge(ws::router())
        .merge(upload::router(config.max_upload_bytes))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on port {}", config.port);

    axum::serve(listener, root_router.into_make_service()).await
}
