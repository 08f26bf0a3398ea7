//! Storefront page handlers.
//!
//! Deliberately thin: catalog, cart, and admin CRUD live elsewhere. These
//! handlers exist so both admission tiers are observable end to end — the
//! gate middleware in front, the render guard inside the protected pages.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::gate;
use crate::guard::{GuardDecision, RouteGuard};
use crate::services::session::Role;
use crate::state::AppState;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><title>{title}</title></head><body><h1>{title}</h1><p>{body}</p></body></html>"
    ))
}

/// Run a guard and translate its decision into a response.
async fn guarded(state: &AppState, path: &str, guard: RouteGuard, view: impl FnOnce() -> Html<String>) -> Response {
    match guard.authorize(&state.sessions, path).await {
        GuardDecision::Render => view().into_response(),
        GuardDecision::Redirect { to } | GuardDecision::Forbidden { to } => Redirect::temporary(&to).into_response(),
        GuardDecision::Inconsistent => {
            // Token present but no user record: recoverable, so no redirect
            // loop — show the retry page instead.
            page("Something went wrong", "We could not load your account. Please try again.").into_response()
        }
        GuardDecision::Wait => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

pub async fn home() -> Html<String> {
    page("Storefront", "Browse products, categories, and offers.")
}

pub async fn products() -> Html<String> {
    page("Products", "Product listing.")
}

pub async fn login() -> Html<String> {
    page("Sign in", "Enter your credentials.")
}

pub async fn register() -> Html<String> {
    page("Create account", "Register a new account.")
}

/// OAuth providers land here after consent; the gate exempts this path so
/// the round trip can complete even with a fresh credential already set.
pub async fn auth_callback() -> Html<String> {
    page("Signing you in", "Completing authentication.")
}

/// `POST /logout` — voluntary sign-out. Clears the session cache and
/// deletes the credential cookies together, the same scrub as a forced
/// logout.
pub async fn logout(State(state): State<AppState>) -> Response {
    state.sessions.logout().await;
    (gate::scrub_jar(state.cookie_secure), Redirect::temporary("/")).into_response()
}

pub async fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, page("Forbidden", "You do not have access to this page.")).into_response()
}

pub async fn account(State(state): State<AppState>) -> Response {
    guarded(&state, "/account", RouteGuard::new(), || {
        let snap = state.sessions.snapshot();
        let who = snap
            .user
            .as_ref()
            .map_or_else(|| "customer".to_owned(), |u| format!("{} ({})", u.name, u.email));
        page("Your account", &format!("Signed in as {who}. Profile, addresses, and settings."))
    })
    .await
}

pub async fn orders(State(state): State<AppState>) -> Response {
    guarded(&state, "/orders", RouteGuard::new(), || page("Your orders", "Order history.")).await
}

pub async fn admin(State(state): State<AppState>) -> Response {
    guarded(
        &state,
        "/admin",
        RouteGuard::new().require_role(Role::Admin).fallback_to("/login"),
        || page("Admin console", "Catalog, orders, and customers."),
    )
    .await
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
