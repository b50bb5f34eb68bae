//! Server-held sessions and the gate that issues, checks, and destroys them.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::auth::CredentialVerifier;
use crate::config::SessionConfig;

/// Proof of a successful login, referenced by an opaque token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub authenticated: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Storage for sessions keyed by token. Only the request holding a token ever
/// writes that token's record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, token: &str, session: Session) -> anyhow::Result<()>;
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>>;
    async fn remove(&self, token: &str) -> anyhow::Result<()>;
}

/// Process-local store; sessions do not survive a restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, token: &str, session: Session) -> anyhow::Result<()> {
        self.sessions.write().await.insert(token.to_string(), session);
        Ok(())
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> anyhow::Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("failed to store session")]
    Store(#[from] anyhow::Error),
}

/// The caller holds no valid authenticated session.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unauthorized")]
pub struct Unauthorized;

/// Decides who holds a session. Credentials are checked by a pluggable
/// [`CredentialVerifier`]; sessions live in a pluggable [`SessionStore`].
pub struct SessionGate {
    verifier: Arc<dyn CredentialVerifier>,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    /// Tokens whose store teardown failed; honoured until the session would
    /// have expired anyway.
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionGate {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            verifier,
            store,
            config,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    /// End of a session started at `now`; saturates instead of overflowing.
    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.config.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Check credentials and open a new authenticated session.
    ///
    /// On failure nothing is created and `previous` is left alone. On success
    /// the returned token replaces `previous`, which is destroyed.
    pub async fn authenticate(
        &self,
        previous: Option<&str>,
        username: &str,
        password: &str,
    ) -> Result<(String, Session), AuthError> {
        if !self.verifier.verify(username, password) {
            warn!("rejected login attempt for '{username}'");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = Session {
            username: username.to_string(),
            authenticated: true,
            created_at: now,
            expires_at: self.expiry_from(now),
        };
        let token = new_token();
        self.store.insert(&token, session.clone()).await?;

        if let Some(old) = previous {
            self.destroy(old).await;
        }

        info!("operator '{username}' signed in");
        Ok((token, session))
    }

    /// Pass iff `token` names a live session marked authenticated.
    pub async fn require(&self, token: Option<&str>) -> Result<Session, Unauthorized> {
        let token = token.ok_or(Unauthorized)?;
        let now = Utc::now();

        if self.is_revoked(token, now).await {
            return Err(Unauthorized);
        }

        let session = match self.store.get(token).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(Unauthorized),
            Err(err) => {
                warn!("session lookup failed: {err:#}");
                return Err(Unauthorized);
            }
        };

        if session.is_expired(now) {
            if let Err(err) = self.store.remove(token).await {
                warn!("failed to drop expired session: {err:#}");
            }
            return Err(Unauthorized);
        }
        if !session.authenticated {
            return Err(Unauthorized);
        }

        Ok(session)
    }

    /// Invalidate `token`. Never fails from the caller's point of view.
    pub async fn destroy(&self, token: &str) {
        if let Err(err) = self.store.remove(token).await {
            error!("session destruction error: {err:#}");
            let until = self.expiry_from(Utc::now());
            let mut revoked = self.revoked.write().await;
            revoked.retain(|_, expires| *expires > Utc::now());
            revoked.insert(token.to_string(), until);
        }
    }

    async fn is_revoked(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.revoked
            .read()
            .await
            .get(token)
            .is_some_and(|until| *until > now)
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
