use auth::{
    authorization_api::AuthApiError, plugin_registry::RegistryError,
    session_store::SessionStoreError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use connect::SignerError;

/// The caller sent something we can't act on. Always a 400.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid request: cannot validate payload with signature.")]
    InvalidSignature,
    #[error("Invalid request: cannot read nonce from payload. {0}")]
    UnreadableNonce(SignerError),
    #[error("Invalid request: landed on `/return` endpoint without `nonce` set in session.")]
    MissingSessionNonce,
    #[error("Invalid request: landed on `/return` endpoint without logged in.")]
    NotAuthenticated,
}

/// The gateway isn't set up so that a delegate plugin can be picked.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Cannot locate at least 2 auth plugins. Found {0} plugins.")]
    TooFewPlugins(usize),
    #[error("Cannot locate available plugins.")]
    NoEligiblePlugin,
    #[error("Cannot locate configured target auth plugin `{0}` among available plugins.")]
    TargetPluginUnavailable(String),
    #[error("Authentication strategy `{0}` has no login flow.")]
    NoLoginFlow(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Cannot locate user with id: {0}")]
    UserNotFound(String),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    AuthorizationApi(#[from] AuthApiError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SsoError {
    pub fn status(&self) -> StatusCode {
        match self {
            SsoError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SsoError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
            (status, format!("Error: {self}")).into_response()
        } else {
            tracing::warn!("{self}");
            (status, self.to_string()).into_response()
        }
    }
}
