/*
    Client for the gateway's authorization API.
    Every request carries an `X-Magda-Session` JWT signed with the shared jwt secret, acting as the configured service user.
*/
use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use super::data_model::{decode_json, Role, UserProfile};

pub static SESSION_HEADER_NAME: &str = "X-Magda-Session";

#[derive(Debug, thiserror::Error)]
pub enum AuthApiError {
    #[error("authorization API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authorization API responded {status} for {url}")]
    Status { status: StatusCode, url: Url },
    #[error("authorization API response is malformed: {0}")]
    Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
    #[error("cannot sign authorization API session token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("authorization API url `{0}` cannot take a path")]
    BaseUrl(Url),
}
pub type AuthApiResult<T> = Result<T, AuthApiError>;

#[mockall::automock]
#[async_trait]
pub trait AuthorizationApi: Send + Sync {
    /// Ok(None) when the API doesn't know the user.
    async fn get_user(&self, user_id: &str) -> AuthApiResult<Option<UserProfile>>;
    async fn get_user_roles(&self, user_id: &str) -> AuthApiResult<Vec<Role>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims<'a> {
    user_id: &'a str,
    iat: u64,
}

#[derive(Clone)]
pub struct HttpAuthorizationApi {
    client: reqwest::Client,
    base_url: Url,
    jwt_secret: String,
    user_id: String,
}

impl HttpAuthorizationApi {
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        jwt_secret: impl Into<String>,
        user_id: impl Into<String>,
    ) -> AuthApiResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(AuthApiError::BaseUrl(base_url));
        }
        Ok(Self {
            client,
            base_url,
            jwt_secret: jwt_secret.into(),
            user_id: user_id.into(),
        })
    }

    fn session_token(&self) -> AuthApiResult<String> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let token = jsonwebtoken::encode(
            &Header::default(),
            &SessionClaims {
                user_id: &self.user_id,
                iat,
            },
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// `<base>/auth/users/<user_id>[/<tail>]`
    fn user_url(&self, user_id: &str, tail: Option<&str>) -> AuthApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuthApiError::BaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["auth", "users", user_id])
            .extend(tail);
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> AuthApiResult<Option<bytes::Bytes>> {
        let response = self
            .client
            .get(url.clone())
            .header(SESSION_HEADER_NAME, self.session_token()?)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?)),
            status => Err(AuthApiError::Status { status, url }),
        }
    }
}

#[async_trait]
impl AuthorizationApi for HttpAuthorizationApi {
    #[tracing::instrument(skip(self), err)]
    async fn get_user(&self, user_id: &str) -> AuthApiResult<Option<UserProfile>> {
        match self.fetch(self.user_url(user_id, None)?).await? {
            Some(body) => Ok(Some(decode_json(&body)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn get_user_roles(&self, user_id: &str) -> AuthApiResult<Vec<Role>> {
        let url = self.user_url(user_id, Some("roles"))?;
        match self.fetch(url.clone()).await? {
            Some(body) => Ok(decode_json(&body)?),
            None => Err(AuthApiError::Status {
                status: StatusCode::NOT_FOUND,
                url,
            }),
        }
    }
}
