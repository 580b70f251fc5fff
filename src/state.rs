use auth::{
    authorization_api::{AuthorizationApi, HttpAuthorizationApi},
    cookie_signature::CookieSigner,
    plugin_registry::{HttpPluginRegistry, PluginRegistry},
    session_store::{MemorySessionStore, RedisSessionStore, SessionStore},
};
use axum::extract::FromRef;
use connect::{ConnectSigner, SignerError};
use std::{error::Error, sync::Arc};

use crate::{config::PluginConfig, session::SessionSettings};

#[derive(Clone, FromRef)]
pub struct SsoState {
    pub config: Arc<PluginConfig>,
    pub signer: ConnectSigner,
    pub sessions: SessionSettings,
    pub authorization_api: Arc<dyn AuthorizationApi>,
    pub plugin_registry: Arc<dyn PluginRegistry>,
}

impl SsoState {
    pub fn new(
        config: PluginConfig,
        store: Arc<dyn SessionStore>,
        authorization_api: Arc<dyn AuthorizationApi>,
        plugin_registry: Arc<dyn PluginRegistry>,
    ) -> Result<Self, SignerError> {
        let signer = ConnectSigner::new(config.discourse_connect_secret.as_str())?;
        let sessions = SessionSettings {
            store,
            signer: CookieSigner::new(&config.session_secret),
            cookie: Arc::new(config.session.clone()),
        };
        Ok(Self {
            config: Arc::new(config),
            signer,
            sessions,
            authorization_api,
            plugin_registry,
        })
    }

    /// Connects the session store and HTTP clients the config points at.
    #[tracing::instrument(skip_all, err)]
    pub fn from_config(config: PluginConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let store: Arc<dyn SessionStore> = match &config.redis_url {
            Some(redis_url) => Arc::new(RedisSessionStore::open(
                redis_url,
                config.session.ttl_secs,
            )?),
            None => {
                tracing::warn!("no redis_url configured, sessions are kept in process memory");
                Arc::new(MemorySessionStore::new())
            }
        };
        let client = reqwest::Client::new();
        let authorization_api = HttpAuthorizationApi::new(
            client.clone(),
            config.auth_api_url.clone(),
            config.jwt_secret.as_str(),
            config.user_id.as_str(),
        )?;
        let plugin_registry = HttpPluginRegistry::new(client, &config.gateway_url)?;
        Ok(Self::new(
            config,
            store,
            Arc::new(authorization_api),
            Arc::new(plugin_registry),
        )?)
    }
}
