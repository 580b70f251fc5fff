/*
    The gateway lists every installed identity plugin at `<gateway>/auth/plugins`.
    We ask it which other plugin can authenticate a caller who isn't logged in yet.
*/
use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use super::data_model::{decode_json, PluginDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("plugin registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("plugin registry responded {status} for {url}")]
    Status { status: StatusCode, url: Url },
    #[error("plugin registry response is malformed: {0}")]
    Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
    #[error("gateway url `{0}` cannot take a path")]
    BaseUrl(Url),
}

#[mockall::automock]
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    /// Plugins in registry order.
    async fn plugins(&self) -> Result<Vec<PluginDescriptor>, RegistryError>;
}

#[derive(Clone, Debug)]
pub struct HttpPluginRegistry {
    client: reqwest::Client,
    plugins_url: Url,
}

impl HttpPluginRegistry {
    pub fn new(client: reqwest::Client, gateway_url: &Url) -> Result<Self, RegistryError> {
        let mut plugins_url = gateway_url.clone();
        plugins_url
            .path_segments_mut()
            .map_err(|_| RegistryError::BaseUrl(gateway_url.clone()))?
            .pop_if_empty()
            .extend(["auth", "plugins"]);
        Ok(Self {
            client,
            plugins_url,
        })
    }

    pub fn plugins_url(&self) -> &Url {
        &self.plugins_url
    }
}

#[async_trait]
impl PluginRegistry for HttpPluginRegistry {
    #[tracing::instrument(skip_all, err)]
    async fn plugins(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        let response = self
            .client
            .get(self.plugins_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                status,
                url: self.plugins_url.clone(),
            });
        }
        let body = response.bytes().await?;
        let plugins: Vec<PluginDescriptor> = decode_json(&body)?;
        tracing::debug!(count = plugins.len(), "fetched auth plugins");
        Ok(plugins)
    }
}
