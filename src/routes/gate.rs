//! Admission gate — the per-request edge filter.
//!
//! DESIGN
//! ======
//! Runs once per inbound request, before any page handler. The decision is a
//! pure function of the request: classify the path, extract a credential
//! from header or cookie, check expiry through the codec chain, and either
//! pass, redirect, or redirect with a cookie scrub. The gate checks only
//! credential presence and validity; role enforcement belongs to the render
//! guard, which has the hydrated user.
//!
//! ERROR HANDLING
//! ==============
//! An expired, malformed, or undecodable credential always forces the scrub
//! redirect, regardless of route class. Remote decode failures degrade to
//! the local decode inside the codec and never surface here.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::services::classifier::{RouteClass, RouteTable};
use crate::services::codec::CredentialCodec;
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const LEGACY_AUTH_COOKIE: &str = "auth_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// The OAuth callback must stay reachable with a valid credential, or the
/// provider round trip can never complete.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

const BYPASS_PREFIXES: &[&str] = &["/api", "/static", "/healthz"];
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".webp"];

/// Terminal outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Pass,
    Redirect { to: String, clear_cookies: bool },
}

/// Static assets, API routes, and image files never reach the gate logic.
#[must_use]
pub fn bypassed(path: &str) -> bool {
    BYPASS_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
        || IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Credential extraction order: `Authorization: Bearer` header, then the
/// access-token cookie, then the legacy auth cookie.
#[must_use]
pub fn extract_credential(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(raw) = value.to_str() {
            if let Some(token) = raw.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token.to_owned());
                }
            }
        }
    }
    for name in [ACCESS_TOKEN_COOKIE, LEGACY_AUTH_COOKIE] {
        if let Some(cookie) = jar.get(name) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_owned());
            }
        }
    }
    None
}

/// The admission decision, steps in strict order:
///
/// 1. bypassed paths pass;
/// 2. an expired (or undecodable) credential forces the scrub redirect,
///    whatever the route class;
/// 3. a protected route without a credential redirects to login with the
///    original path as return target;
/// 4. an auth-only route with a valid credential bounces to the storefront
///    home, except the OAuth callback;
/// 5. everything else passes.
pub async fn admit(codec: &CredentialCodec, table: &RouteTable, path: &str, credential: Option<&str>) -> Admission {
    if bypassed(path) {
        return Admission::Pass;
    }

    if let Some(token) = credential {
        match codec.validate(token).await {
            Ok(claims) => {
                tracing::debug!(
                    subject = claims.sub.as_deref().unwrap_or("unknown"),
                    role = claims.primary_role().unwrap_or("unknown"),
                    "credential accepted"
                );
            }
            Err(e) => {
                tracing::debug!(code = e.code(), error = %e, "credential rejected, forcing logout");
                return Admission::Redirect { to: "/login".to_owned(), clear_cookies: true };
            }
        }
    }

    let class = table.classify(path);
    if class.is_protected() && credential.is_none() {
        return Admission::Redirect { to: format!("/login?from={path}"), clear_cookies: false };
    }
    if class == RouteClass::Auth && credential.is_some() && path != OAUTH_CALLBACK_PATH {
        return Admission::Redirect { to: "/".to_owned(), clear_cookies: false };
    }

    Admission::Pass
}

/// Axum middleware applying [`admit`] to every request.
pub async fn admission(State(state): State<AppState>, jar: CookieJar, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let credential = extract_credential(req.headers(), &jar);

    match admit(&state.codec, &state.routes, &path, credential.as_deref()).await {
        Admission::Pass => next.run(req).await,
        Admission::Redirect { to, clear_cookies: false } => {
            tracing::debug!(%path, %to, "gate redirect");
            Redirect::temporary(&to).into_response()
        }
        Admission::Redirect { to, clear_cookies: true } => {
            tracing::debug!(%path, %to, "gate redirect with cookie scrub");
            (scrub_jar(state.cookie_secure), Redirect::temporary(&to)).into_response()
        }
    }
}

/// All credential cookies are deleted together on any logout path, forced
/// or voluntary.
pub(crate) fn scrub_jar(secure: bool) -> CookieJar {
    let mut jar = CookieJar::new();
    for name in [ACCESS_TOKEN_COOKIE, LEGACY_AUTH_COOKIE, REFRESH_TOKEN_COOKIE] {
        let cookie = Cookie::build((name, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .max_age(Duration::ZERO);
        jar = jar.add(cookie);
    }
    jar
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
