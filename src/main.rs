mod config;
mod guard;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::classifier::RouteTable;
use services::codec::CredentialCodec;
use services::session::{HttpUserFetcher, SessionService};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let authority = config::AuthorityConfig::from_env();
    let port: u16 = config::env_parse("PORT", 3000);

    let client = authority.http_client().expect("http client build failed");
    // AUTH_DECODE_LOCAL_ONLY skips the remote authority entirely (offline
    // or air-gapped deployments); the fallback order is otherwise fixed.
    let codec = if config::env_bool("AUTH_DECODE_LOCAL_ONLY").unwrap_or(false) {
        Arc::new(CredentialCodec::local_only())
    } else {
        Arc::new(CredentialCodec::remote_then_local(client.clone(), authority.base_url.clone()))
    };
    let fetcher = Arc::new(HttpUserFetcher::new(client, authority.base_url.clone()));
    let sessions = Arc::new(SessionService::new(fetcher, config::session_store_path()));

    // Durable rehydration must complete before any guard trusts the cache.
    sessions.init().await;

    let cookie_secure = config::cookie_secure(&authority);
    let state = state::AppState::new(codec, Arc::new(RouteTable::default()), sessions, cookie_secure);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, authority = %authority.base_url, "storegate listening");
    axum::serve(listener, app).await.expect("server failed");
}
