//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the gate middleware via the
//! `State` extractor. The gate itself keeps no per-request mutable state;
//! the session service is the only shared mutable resource and carries its
//! own synchronization.

use std::sync::Arc;

use crate::services::classifier::RouteTable;
use crate::services::codec::CredentialCodec;
use crate::services::session::SessionService;

/// Shared application state. Clone is required by Axum; all inner fields are
/// Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<CredentialCodec>,
    pub routes: Arc<RouteTable>,
    pub sessions: Arc<SessionService>,
    /// Whether scrub cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
}

impl AppState {
    #[must_use]
    pub fn new(
        codec: Arc<CredentialCodec>,
        routes: Arc<RouteTable>,
        sessions: Arc<SessionService>,
        cookie_secure: bool,
    ) -> Self {
        Self { codec, routes, sessions, cookie_secure }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
