//! Render guard — the component-tier gate over the session cache.
//!
//! DESIGN
//! ======
//! The edge gate only checks that a credential exists and is unexpired; it
//! never fetches the user. This guard runs where the hydrated user record is
//! available and enforces the precise policy: authentication first, then
//! role membership. Two tiers on purpose: the gate is cheap and runs on
//! every request, the guard is exact and runs only where a protected view
//! is about to render.
//!
//! The guard renders nothing until the session cache's durable rehydration
//! has completed. Skipping that wait either flashes protected content or
//! issues a false redirect off provisional state.

use crate::services::errors::AuthError;
use crate::services::session::{Role, SessionService, SessionSnapshot};

/// Terminal decision for one evaluation. Recomputed whenever the underlying
/// session snapshot changes; the guard itself never retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Durable rehydration has not completed. Render nothing yet.
    Wait,
    /// Authenticated (and role-authorized where required). Render the view.
    Render,
    /// Not authenticated. Navigate to the fallback with a return target.
    Redirect { to: String },
    /// Authenticated but the role is not in the required set. Navigates to
    /// the forbidden destination, never to login: the credential was fine.
    Forbidden { to: String },
    /// Authenticated but the user record is missing. A hydration
    /// inconsistency, not an authorization failure: surfaced as a
    /// recoverable state instead of a redirect loop.
    Inconsistent,
}

/// Where role mismatches land. Distinct from the login fallback.
pub const FORBIDDEN_PATH: &str = "/forbidden";

const DEFAULT_FALLBACK: &str = "/login";

/// Component-level guard configuration: optional role requirements plus the
/// destination for unauthenticated visitors.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    required_roles: Vec<Role>,
    fallback_to: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new() -> Self {
        Self { required_roles: Vec::new(), fallback_to: DEFAULT_FALLBACK.to_owned() }
    }

    /// Require membership in the given role to render.
    #[must_use]
    pub fn require_role(mut self, role: Role) -> Self {
        self.required_roles.push(role);
        self
    }

    /// Override the unauthenticated destination (default `/login`).
    #[must_use]
    pub fn fallback_to(mut self, to: impl Into<String>) -> Self {
        self.fallback_to = to.into();
        self
    }

    /// Pure decision over a snapshot. `current_path` becomes the return
    /// target attached to an unauthenticated redirect.
    #[must_use]
    pub fn evaluate(&self, snapshot: &SessionSnapshot, current_path: &str) -> GuardDecision {
        if !snapshot.is_initialized {
            return GuardDecision::Wait;
        }
        if !snapshot.is_authenticated {
            // credential_present distinguishes a signed-out visitor from a
            // session invalidated by a failed hydration.
            tracing::debug!(
                path = current_path,
                credential_present = snapshot.credential.is_some(),
                "unauthenticated, redirecting to fallback"
            );
            return GuardDecision::Redirect { to: format!("{}?from={current_path}", self.fallback_to) };
        }
        if !self.required_roles.is_empty() {
            let Some(user) = &snapshot.user else {
                return GuardDecision::Inconsistent;
            };
            if !self.required_roles.contains(&user.role) {
                let err = AuthError::RoleMismatch {
                    required: self.required_roles.iter().map(|r| r.as_str().to_owned()).collect(),
                    actual: user.role.as_str().to_owned(),
                };
                tracing::warn!(code = err.code(), error = %err, path = current_path, "render denied");
                return GuardDecision::Forbidden { to: FORBIDDEN_PATH.to_owned() };
            }
        }
        GuardDecision::Render
    }

    /// Wait for durable rehydration to complete, then evaluate once.
    pub async fn authorize(&self, sessions: &SessionService, current_path: &str) -> GuardDecision {
        let mut rx = sessions.subscribe();
        loop {
            let decision = self.evaluate(&rx.borrow_and_update().clone(), current_path);
            if decision != GuardDecision::Wait {
                return decision;
            }
            // Sender dropped means the service is gone; stay in Wait.
            if rx.changed().await.is_err() {
                return GuardDecision::Wait;
            }
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
