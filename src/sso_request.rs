use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query},
    http::request::Parts,
};
use connect::ConnectSigner;
use serde::Deserialize;

use crate::error::{SsoError, ValidationError};

#[derive(Debug, Default, Deserialize)]
struct HandshakeQuery {
    #[serde(default)]
    sso: String,
    #[serde(default)]
    sig: String,
}

/// Verify a Discourse Connect handshake (`?sso=..&sig=..`) and extract its nonce.
/// Rejects before the handler runs, so a bad handshake never reaches the session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SsoRequest {
    pub nonce: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for SsoRequest
where
    ConnectSigner: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SsoError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let signer = ConnectSigner::from_ref(state);
        let Query(handshake) = Query::<HandshakeQuery>::try_from_uri(&parts.uri)
            .map_err(|_| ValidationError::InvalidSignature)?;
        if !signer.validate(&handshake.sso, &handshake.sig) {
            return Err(ValidationError::InvalidSignature.into());
        }
        let nonce = signer
            .nonce(&handshake.sso)
            .map_err(ValidationError::UnreadableNonce)?;
        Ok(SsoRequest { nonce })
    }
}
