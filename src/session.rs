use auth::{
    cookie_signature::CookieSigner,
    data_model::{SessionId, SessionState},
    session_store::{SessionStore, SessionStoreError},
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::COOKIE, request::Parts, HeaderMap},
};
use cookie::{Cookie, SameSite};
use std::sync::Arc;
use uuid::Uuid;

use crate::{config::SessionConfig, error::SsoError};

#[derive(Clone)]
pub struct SessionSettings {
    pub store: Arc<dyn SessionStore>,
    pub signer: CookieSigner,
    pub cookie: Arc<SessionConfig>,
}

/// The caller's session record, loaded before the handler runs.
/// Callers without a validly signed session cookie get a fresh id and an empty record.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    is_new: bool,
}

impl Session {
    /// Writes the record back. Returns the cookie to hand out when the caller had no session yet.
    #[tracing::instrument(skip_all, err)]
    pub async fn save(
        &self,
        settings: &SessionSettings,
    ) -> Result<Option<Cookie<'static>>, SessionStoreError> {
        settings.store.save(&self.id, &self.state).await?;
        if !self.is_new {
            return Ok(None);
        }
        let options = &settings.cookie;
        let mut cookie = Cookie::build((options.cookie_name.clone(), settings.signer.sign(&self.id)))
            .secure(options.secure)
            .http_only(true)
            // the forum sends the browser here with a top level cross site navigation
            .same_site(SameSite::Lax)
            .path(options.path.clone());
        if let Some(domain) = &options.domain {
            cookie = cookie.domain(domain.clone());
        }
        Ok(Some(cookie.build()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    SessionSettings: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SsoError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = SessionSettings::from_ref(state);
        let Some(id) =
            session_id_cookie_value(&parts.headers, &settings.cookie.cookie_name, &settings.signer)
        else {
            return Ok(Session {
                id: Uuid::new_v4().to_string(),
                state: SessionState::default(),
                is_new: true,
            });
        };
        let state = settings.store.load(&id).await?.unwrap_or_default();
        Ok(Session {
            id,
            state,
            is_new: false,
        })
    }
}

/// Session id from the first cookie named `cookie_name` that carries a valid signature.
/// Values are percent-decoded first, browsers send back what express-session encoded.
pub fn session_id_cookie_value(
    headers: &HeaderMap,
    cookie_name: &str,
    signer: &CookieSigner,
) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|cookie| Cookie::parse_encoded(cookie.trim()).ok())
        .filter(|cookie| cookie.name() == cookie_name)
        .find_map(|cookie| signer.unsign(cookie.value()).map(str::to_string))
        .filter(|id| !id.is_empty())
}
