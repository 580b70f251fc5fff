use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use super::data_model::{SessionId, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("session record is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sessions are shared with the identity provider, which owns the records.
/// We only read the authenticated user and read/write the nonce.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// None when no record exists for the id.
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError>;
    /// Writes the whole record and refreshes its expiry.
    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), SessionStoreError>;
}

#[derive(Clone, Debug)]
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn open(redis_url: &str, ttl_secs: u64) -> Result<Self, SessionStoreError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            ttl_secs,
        })
    }
}

fn record_key(session_id: &str) -> String {
    format!("sess:{session_id}")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[tracing::instrument(skip(self), err)]
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(record_key(session_id))
            .query_async(&mut conn)
            .await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, state), err)]
    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), SessionStoreError> {
        let raw = serde_json::to_string(state)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(record_key(session_id))
            .arg(raw)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Process local sessions, for running without redis and for tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionState>>>,
}

impl MemorySessionStore {
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
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }
}
