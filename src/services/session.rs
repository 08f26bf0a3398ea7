//! Session cache — the client-tier record of authentication state.
//!
//! ARCHITECTURE
//! ============
//! A single process-wide session record (this tier models the customer's
//! device, not the multi-user edge). The record is persisted to a local JSON
//! file on every mutation and re-loaded once at startup by `init`; until
//! that load completes every read is provisional (`is_initialized == false`)
//! and the guard renders nothing.
//!
//! CONCURRENCY
//! ===========
//! The record sits behind an `RwLock`; observers get change notifications
//! through a `watch` channel. Hydration is single-flight: `try_lock` on a
//! dedicated mutex makes an overlapping `hydrate` a no-op rather than a
//! second network call. An epoch counter, bumped by `login`/`logout`,
//! discards a hydration result that lost to a newer mutation instead of
//! letting the slow writer win.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{Mutex, RwLock, watch};

use super::errors::AuthError;

// =============================================================================
// ROLES AND USERS
// =============================================================================

/// Closed role set. Everything the backend emits is normalized into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Normalize a raw role claim. The legacy `superadmin` alias collapses
    /// into `Admin`; anything unrecognized is a plain user.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" | "superadmin" => Self::Admin,
            _ => Self::User,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Postal address attached to a customer record. All fields optional; the
/// storefront renders whatever is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Customer record as returned by the current-user endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "role_from_raw")]
    pub role: Role,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn role_from_raw<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map_or(Role::User, Role::normalize))
}

// =============================================================================
// RECORD AND SNAPSHOT
// =============================================================================

/// The persisted portion of the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user: Option<User>,
    pub credential: Option<String>,
    pub is_authenticated: bool,
}

/// Point-in-time view handed to the guard and page handlers.
///
/// Invariant: `is_authenticated` is true iff `credential` is present and the
/// last validation did not mark it expired or invalid. `user` may lag
/// `credential` until hydration completes.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub credential: Option<String>,
    pub is_authenticated: bool,
    pub is_initialized: bool,
    pub is_hydrating: bool,
}

// =============================================================================
// USER FETCHER
// =============================================================================

/// Seam for the current-user endpoint so tests can count and stall calls.
#[async_trait]
pub trait UserFetcher: Send + Sync {
    async fn fetch_current_user(&self, credential: &str) -> Result<User, AuthError>;
}

/// `GET {base}/users/me` with a bearer header.
pub struct HttpUserFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl UserFetcher for HttpUserFetcher {
    async fn fetch_current_user(&self, credential: &str) -> Result<User, AuthError> {
        let url = format!("{}/users/me", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {credential}"))
            .send()
            .await
            .map_err(|e| AuthError::RemoteAuthorityUnavailable { op: "me", reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(AuthError::RemoteAuthorityUnavailable { op: "me", reason: format!("status {}", resp.status()) });
        }

        resp.json::<User>()
            .await
            .map_err(|e| AuthError::RemoteAuthorityUnavailable { op: "me", reason: format!("body: {e}") })
    }
}

// =============================================================================
// SESSION SERVICE
// =============================================================================

/// Result of a `hydrate` call. Failure is terminal for this attempt; the
/// caller decides whether to invoke `hydrate` again later.
#[derive(Debug)]
pub enum HydrateOutcome {
    /// User record refreshed from the authority.
    Hydrated,
    /// No credential, nothing to do.
    NoCredential,
    /// Another hydration already holds the flight lock.
    AlreadyInFlight,
    /// A `login`/`logout` happened mid-flight; the result was discarded.
    Superseded,
    /// The fetch failed; the session is now unauthenticated.
    Failed(AuthError),
}

struct Inner {
    record: SessionRecord,
    initialized: bool,
    hydrating: bool,
    epoch: u64,
}

/// Dependency-injected session service with an explicit lifecycle:
/// `init` → (`login` | `logout` | `hydrate`)*.
pub struct SessionService {
    inner: RwLock<Inner>,
    /// Single-flight guard for hydration. `try_lock` failure means a
    /// hydration is already running and the new call becomes a no-op.
    hydrate_flight: Mutex<()>,
    fetcher: Arc<dyn UserFetcher>,
    store_path: PathBuf,
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionService {
    #[must_use]
    pub fn new(fetcher: Arc<dyn UserFetcher>, store_path: PathBuf) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            inner: RwLock::new(Inner {
                record: SessionRecord::default(),
                initialized: false,
                hydrating: false,
                epoch: 0,
            }),
            hydrate_flight: Mutex::new(()),
            fetcher,
            store_path,
            tx,
        }
    }

    /// Synchronous read of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Change feed for the guard: fires on every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Re-load the persisted record. Called exactly once at process start;
    /// until it runs, all reads are provisional. If a credential survived
    /// but the user record did not, a hydrate is kicked immediately.
    pub async fn init(&self) {
        let record = self.load_record().await;
        let needs_hydrate = record.credential.is_some() && record.user.is_none();
        {
            let mut inner = self.inner.write().await;
            // A credential-less record can never be authenticated, whatever
            // the file claims.
            let mut record = record;
            if record.credential.is_none() {
                record.is_authenticated = false;
                record.user = None;
            }
            inner.record = record;
            inner.initialized = !needs_hydrate;
            self.publish(&inner);
        }

        if needs_hydrate {
            let outcome = self.hydrate().await;
            tracing::info!(outcome = ?outcome, "startup hydration");
        }
    }

    /// Establish a session. Sets user, credential, and the authenticated
    /// flag atomically, then persists.
    pub async fn login(&self, user: User, credential: String) {
        let mut inner = self.inner.write().await;
        inner.record = SessionRecord {
            user: Some(user),
            credential: Some(credential),
            is_authenticated: true,
        };
        inner.initialized = true;
        inner.epoch += 1;
        self.persist(&inner.record).await;
        self.publish(&inner);
    }

    /// Clear the session and delete the persisted record. Idempotent.
    pub async fn logout(&self) {
        let mut inner = self.inner.write().await;
        inner.record = SessionRecord::default();
        inner.initialized = true;
        inner.epoch += 1;
        self.remove_store().await;
        self.publish(&inner);
    }

    /// Refresh the user record from the authority.
    ///
    /// No-op when no credential is stored or a hydration is already in
    /// flight. On success the role-normalized user is stored and the session
    /// is authenticated; on failure the user is cleared and the session is
    /// unauthenticated. Either way the cache counts as initialized. Failures
    /// are not retried here.
    pub async fn hydrate(&self) -> HydrateOutcome {
        let Ok(_flight) = self.hydrate_flight.try_lock() else {
            return HydrateOutcome::AlreadyInFlight;
        };

        let (credential, epoch) = {
            let inner = self.inner.read().await;
            (inner.record.credential.clone(), inner.epoch)
        };
        let Some(credential) = credential else {
            return HydrateOutcome::NoCredential;
        };

        {
            let mut inner = self.inner.write().await;
            inner.hydrating = true;
            self.publish(&inner);
        }

        let fetched = self.fetcher.fetch_current_user(&credential).await;

        let mut inner = self.inner.write().await;
        inner.hydrating = false;
        if inner.epoch != epoch {
            // A login/logout superseded this flight; its result is stale.
            self.publish(&inner);
            return HydrateOutcome::Superseded;
        }

        let outcome = match fetched {
            Ok(user) => {
                inner.record.user = Some(user);
                inner.record.is_authenticated = true;
                HydrateOutcome::Hydrated
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "hydration failed, session unauthenticated");
                inner.record.user = None;
                inner.record.is_authenticated = false;
                HydrateOutcome::Failed(AuthError::HydrationInconsistency(e.to_string()))
            }
        };
        inner.initialized = true;
        self.persist(&inner.record).await;
        self.publish(&inner);
        outcome
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(SessionSnapshot {
            user: inner.record.user.clone(),
            credential: inner.record.credential.clone(),
            is_authenticated: inner.record.is_authenticated,
            is_initialized: inner.initialized,
            is_hydrating: inner.hydrating,
        });
    }

    // Persistence is best effort: a read-only disk must not take the
    // storefront down. Failures are logged and the in-memory state stands.
    async fn persist(&self, record: &SessionRecord) {
        let json = match serde_json::to_vec_pretty(record) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "session record serialization failed");
                return;
            }
        };
        if let Some(parent) = self.store_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(error = %e, path = %parent.display(), "session store dir create failed");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&self.store_path, json).await {
            tracing::warn!(error = %e, path = %self.store_path.display(), "session record write failed");
        }
    }

    async fn remove_store(&self) {
        match tokio::fs::remove_file(&self.store_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, path = %self.store_path.display(), "session record delete failed"),
        }
    }

    async fn load_record(&self) -> SessionRecord {
        match tokio::fs::read(&self.store_path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "persisted session record corrupt, starting empty");
                    SessionRecord::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionRecord::default(),
            Err(e) => {
                tracing::warn!(error = %e, "persisted session record unreadable, starting empty");
                SessionRecord::default()
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
