//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every page route sits behind the admission gate middleware; static files
//! and `/healthz` are matched by the gate's bypass list before any decision
//! logic runs. Protected pages additionally run the render guard once the
//! session cache is hydrated.

pub mod gate;
pub mod pages;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Resolve the static asset directory (`STATIC_DIR`, default `./static`).
fn static_dir() -> PathBuf {
    std::env::var("STATIC_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./static"))
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(pages::home))
        .route("/products", get(pages::products))
        .route("/login", get(pages::login))
        .route("/register", get(pages::register))
        .route("/auth/callback", get(pages::auth_callback))
        .route("/logout", post(pages::logout))
        .route("/forbidden", get(pages::forbidden))
        .route("/account", get(pages::account))
        .route("/orders", get(pages::orders))
        .route("/admin", get(pages::admin))
        .route("/healthz", get(healthz))
        .nest_service("/static", ServeDir::new(static_dir()))
        .layer(middleware::from_fn_with_state(state.clone(), gate::admission))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
