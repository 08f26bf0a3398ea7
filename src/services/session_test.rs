use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

// =============================================================================
// Test plumbing
// =============================================================================

static STORE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique store path per test to keep parallel tests isolated.
fn temp_store() -> PathBuf {
    let n = STORE_SEQ.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("storegate-session-test-{}-{n}.json", std::process::id()))
}

fn sample_user(role: Role) -> User {
    User {
        id: "u-1".into(),
        name: "Ada".into(),
        email: "ada@example.com".into(),
        role,
        addresses: vec![],
        created_at: Some("2024-01-01T00:00:00Z".into()),
    }
}

struct FakeFetcher {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl FakeFetcher {
    fn ok() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: false })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: true })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay, fail: false })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserFetcher for FakeFetcher {
    async fn fetch_current_user(&self, _credential: &str) -> Result<User, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AuthError::RemoteAuthorityUnavailable { op: "me", reason: "503".into() });
        }
        Ok(sample_user(Role::User))
    }
}

fn service(fetcher: Arc<FakeFetcher>, path: PathBuf) -> SessionService {
    SessionService::new(fetcher, path)
}

// =============================================================================
// Role normalization
// =============================================================================

#[test]
fn role_normalization_table() {
    assert_eq!(Role::normalize("admin"), Role::Admin);
    assert_eq!(Role::normalize("ADMIN"), Role::Admin);
    assert_eq!(Role::normalize("superadmin"), Role::Admin);
    assert_eq!(Role::normalize(" SuperAdmin "), Role::Admin);
    assert_eq!(Role::normalize("user"), Role::User);
    assert_eq!(Role::normalize("manager"), Role::User);
    assert_eq!(Role::normalize(""), Role::User);
}

#[test]
fn user_deserializes_remote_payload_shape() {
    let json = serde_json::json!({
        "_id": "abc123",
        "name": "Ada",
        "email": "ada@example.com",
        "role": "SuperAdmin",
        "addresses": [{"label": "home", "city": "Oslo"}],
        "createdAt": "2024-01-01T00:00:00Z",
    });
    let user: User = serde_json::from_value(json).unwrap();
    assert_eq!(user.id, "abc123");
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.addresses.len(), 1);
    assert_eq!(user.addresses[0].city.as_deref(), Some("Oslo"));
    assert_eq!(user.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[test]
fn user_role_defaults_to_user_when_absent() {
    let json = serde_json::json!({"id": "u-2", "name": "Bo", "email": "bo@example.com"});
    let user: User = serde_json::from_value(json).unwrap();
    assert_eq!(user.role, Role::User);
    assert!(user.addresses.is_empty());
}

// =============================================================================
// login / logout
// =============================================================================

#[tokio::test]
async fn login_sets_all_fields_atomically() {
    let path = temp_store();
    let svc = service(FakeFetcher::ok(), path.clone());
    svc.login(sample_user(Role::User), "tok-1".into()).await;

    let snap = svc.snapshot();
    assert!(snap.is_authenticated);
    assert!(snap.is_initialized);
    assert_eq!(snap.credential.as_deref(), Some("tok-1"));
    assert_eq!(snap.user.as_ref().map(|u| u.id.as_str()), Some("u-1"));
    assert!(tokio::fs::try_exists(&path).await.unwrap());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn logout_clears_and_is_idempotent() {
    let path = temp_store();
    let svc = service(FakeFetcher::ok(), path.clone());
    svc.login(sample_user(Role::User), "tok-1".into()).await;

    svc.logout().await;
    let first = svc.snapshot();
    svc.logout().await;
    let second = svc.snapshot();

    for snap in [&first, &second] {
        assert!(!snap.is_authenticated);
        assert!(snap.is_initialized);
        assert!(snap.user.is_none());
        assert!(snap.credential.is_none());
    }
    assert!(!tokio::fs::try_exists(&path).await.unwrap());
}

// =============================================================================
// init — durable rehydration
// =============================================================================

#[tokio::test]
async fn init_restores_persisted_session_without_fetching() {
    let path = temp_store();
    let svc = service(FakeFetcher::ok(), path.clone());
    svc.login(sample_user(Role::Admin), "tok-1".into()).await;

    let fetcher = FakeFetcher::ok();
    let restored = service(fetcher.clone(), path.clone());
    assert!(!restored.snapshot().is_initialized);

    restored.init().await;
    let snap = restored.snapshot();
    assert!(snap.is_initialized);
    assert!(snap.is_authenticated);
    assert_eq!(snap.user.as_ref().map(|u| u.role), Some(Role::Admin));
    assert_eq!(fetcher.call_count(), 0);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn init_hydrates_when_user_record_is_missing() {
    let path = temp_store();
    let record = SessionRecord { user: None, credential: Some("tok-1".into()), is_authenticated: true };
    tokio::fs::write(&path, serde_json::to_vec(&record).unwrap()).await.unwrap();

    let fetcher = FakeFetcher::ok();
    let svc = service(fetcher.clone(), path.clone());
    svc.init().await;

    let snap = svc.snapshot();
    assert_eq!(fetcher.call_count(), 1);
    assert!(snap.is_initialized);
    assert!(snap.is_authenticated);
    assert!(snap.user.is_some());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn init_with_corrupt_store_starts_empty() {
    let path = temp_store();
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let svc = service(FakeFetcher::ok(), path.clone());
    svc.init().await;

    let snap = svc.snapshot();
    assert!(snap.is_initialized);
    assert!(!snap.is_authenticated);
    assert!(snap.credential.is_none());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn init_without_credential_cannot_be_authenticated() {
    let path = temp_store();
    // A tampered record claiming authentication without a credential.
    let record = serde_json::json!({"user": null, "credential": null, "is_authenticated": true});
    tokio::fs::write(&path, record.to_string()).await.unwrap();

    let svc = service(FakeFetcher::ok(), path.clone());
    svc.init().await;
    assert!(!svc.snapshot().is_authenticated);

    let _ = tokio::fs::remove_file(&path).await;
}

// =============================================================================
// hydrate
// =============================================================================

#[tokio::test]
async fn hydrate_without_credential_is_a_noop() {
    let fetcher = FakeFetcher::ok();
    let svc = service(fetcher.clone(), temp_store());
    let outcome = svc.hydrate().await;
    assert!(matches!(outcome, HydrateOutcome::NoCredential));
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn overlapping_hydrations_make_exactly_one_fetch() {
    let path = temp_store();
    let fetcher = FakeFetcher::slow(Duration::from_millis(100));
    let svc = Arc::new(service(fetcher.clone(), path.clone()));
    svc.login(sample_user(Role::User), "tok-1".into()).await;

    let a = tokio::spawn({
        let svc = svc.clone();
        async move { svc.hydrate().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let b = svc.hydrate().await;
    let a = a.await.unwrap();

    assert!(matches!(b, HydrateOutcome::AlreadyInFlight), "second call: {b:?}");
    assert!(matches!(a, HydrateOutcome::Hydrated), "first call: {a:?}");
    assert_eq!(fetcher.call_count(), 1);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn hydrate_failure_marks_session_unauthenticated() {
    let path = temp_store();
    let svc = service(FakeFetcher::failing(), path.clone());
    svc.login(sample_user(Role::User), "tok-1".into()).await;

    let outcome = svc.hydrate().await;
    assert!(matches!(outcome, HydrateOutcome::Failed(AuthError::HydrationInconsistency(_))));

    let snap = svc.snapshot();
    assert!(!snap.is_authenticated);
    assert!(snap.user.is_none());
    assert!(snap.is_initialized);
    assert!(!snap.is_hydrating);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn stale_hydration_loses_to_intervening_logout() {
    let path = temp_store();
    let fetcher = FakeFetcher::slow(Duration::from_millis(150));
    let svc = Arc::new(service(fetcher.clone(), path.clone()));
    svc.login(sample_user(Role::User), "tok-1".into()).await;

    let flight = tokio::spawn({
        let svc = svc.clone();
        async move { svc.hydrate().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    svc.logout().await;
    let outcome = flight.await.unwrap();

    assert!(matches!(outcome, HydrateOutcome::Superseded), "outcome: {outcome:?}");
    let snap = svc.snapshot();
    assert!(!snap.is_authenticated);
    assert!(snap.user.is_none());
    assert!(snap.credential.is_none());
}

// =============================================================================
// watch feed
// =============================================================================

#[tokio::test]
async fn subscribers_observe_mutations() {
    let path = temp_store();
    let svc = service(FakeFetcher::ok(), path.clone());
    let mut rx = svc.subscribe();

    svc.login(sample_user(Role::User), "tok-1".into()).await;
    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await.unwrap().unwrap();
    assert!(rx.borrow().is_authenticated);

    svc.logout().await;
    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await.unwrap().unwrap();
    assert!(!rx.borrow().is_authenticated);
}
