//! Credential codec — decodes bearer tokens into typed claims.
//!
//! DESIGN
//! ======
//! Decoding is an explicit ordered chain of strategies: the remote authority
//! first, the local structural decode as the unconditional fallback. First
//! success wins; when every strategy fails the caller gets the last error,
//! never a silent null. The remote authority being offline must never block
//! a navigation decision, so its failures only demote us to the local,
//! unverified decode.
//!
//! Claims are decoded, NEVER verified: there is no signature check anywhere
//! in this subsystem, so nothing downstream may treat a claim as proof.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use super::errors::AuthError;

/// Typed claims carried inside a credential. All fields optional; unknown
/// fields ignored. Issuers disagree on the subject key, so `sub` also
/// accepts `userId` and `id`, including numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Claims {
    /// Expiry, epoch seconds. Absent means expired (fail-closed).
    #[serde(default)]
    pub exp: Option<i64>,
    /// Subject identifier.
    #[serde(default, alias = "userId", alias = "id", deserialize_with = "string_or_number")]
    pub sub: Option<String>,
    /// Single role claim.
    #[serde(default)]
    pub role: Option<String>,
    /// Multi-role claim; some issuers emit this instead of `role`.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Claims {
    /// The role claim to use for normalization: `role` wins, else the first
    /// entry of `roles`.
    #[must_use]
    pub fn primary_role(&self) -> Option<&str> {
        self.role
            .as_deref()
            .or_else(|| self.roles.as_ref().and_then(|r| r.first().map(String::as_str)))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// One way of turning a token into claims. Strategies are tried in order by
/// [`CredentialCodec::decode`]; each failure is logged and swallowed.
#[async_trait]
pub trait DecodeStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn decode(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Structural decode of the middle segment. No network, no verification.
pub struct LocalDecode;

#[async_trait]
impl DecodeStrategy for LocalDecode {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode_local(token)
    }
}

/// Decode the payload segment of a three-segment token locally.
///
/// # Errors
///
/// `MalformedCredential` for a wrong segment count, undecodable base64, or
/// invalid JSON. Never panics on attacker-controlled input.
pub fn decode_local(token: &str) -> Result<Claims, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::MalformedCredential(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| AuthError::MalformedCredential(format!("payload base64: {e}")))?;
    serde_json::from_slice(&payload).map_err(|e| AuthError::MalformedCredential(format!("payload json: {e}")))
}

/// Decode against the remote authority: `POST {base}/auth/decode/{token}`
/// with the same token as a bearer header. Any transport error or non-2xx
/// status is `RemoteAuthorityUnavailable`.
pub struct RemoteDecode {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteDecode {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl DecodeStrategy for RemoteDecode {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let url = format!("{}/auth/decode/{token}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| AuthError::RemoteAuthorityUnavailable { op: "decode", reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(AuthError::RemoteAuthorityUnavailable {
                op: "decode",
                reason: format!("status {}", resp.status()),
            });
        }

        resp.json::<Claims>()
            .await
            .map_err(|e| AuthError::RemoteAuthorityUnavailable { op: "decode", reason: format!("body: {e}") })
    }
}

// =============================================================================
// CODEC CHAIN
// =============================================================================

/// Ordered decode chain. First strategy to succeed wins.
pub struct CredentialCodec {
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl CredentialCodec {
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self { strategies }
    }

    /// The production chain: remote authority first, local fallback.
    #[must_use]
    pub fn remote_then_local(client: reqwest::Client, base_url: String) -> Self {
        Self::new(vec![Box::new(RemoteDecode::new(client, base_url)), Box::new(LocalDecode)])
    }

    /// Local decode only. Used offline and in tests.
    #[must_use]
    pub fn local_only() -> Self {
        Self::new(vec![Box::new(LocalDecode)])
    }

    /// Decode a token through the chain.
    ///
    /// # Errors
    ///
    /// The last strategy's error when all of them fail.
    pub async fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut last_err = AuthError::MalformedCredential("no decode strategies configured".into());
        for strategy in &self.strategies {
            match strategy.decode(token).await {
                Ok(claims) => return Ok(claims),
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), code = e.code(), error = %e, "decode strategy failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Decode and expiry-check in one step.
    ///
    /// # Errors
    ///
    /// The decode error when the chain fails, `ExpiredCredential` when the
    /// token decoded but its `exp` is in the past or absent. Fail-closed
    /// either way.
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode(token).await?;
        if expired_at(&claims, now_ms()) {
            return Err(AuthError::ExpiredCredential);
        }
        Ok(claims)
    }

    /// Fail-closed expiry check: undecodable tokens and tokens without an
    /// `exp` claim are expired.
    pub async fn is_expired(&self, token: &str) -> bool {
        self.validate(token).await.is_err()
    }
}

/// Expiry comparison at an explicit instant (milliseconds since epoch).
/// `exp` is epoch seconds; expired iff `now_ms >= exp * 1000`.
#[must_use]
pub fn expired_at(claims: &Claims, now_ms: i64) -> bool {
    match claims.exp {
        Some(exp) => now_ms >= exp.saturating_mul(1000),
        None => true,
    }
}

pub(crate) fn now_ms() -> i64 {
    i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
