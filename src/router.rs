use auth::data_model::{Role, UserProfile, ADMIN_ROLE_ID};
use axum::{
    extract::State,
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use connect::LoginClaims;
use cookie::Cookie;
use url::Url;

use crate::{
    config::AuthenticationStrategy,
    error::{ConfigurationError, SsoError, ValidationError},
    plugin_selection::select_plugin,
    session::Session,
    sso_request::SsoRequest,
    state::SsoState,
    urls::{forum_login_url, plugin_login_url},
};

/// The forum's connect endpoint points at `/` (or `/sso`), other plugins send the caller back to `/return`.
pub fn router(state: SsoState) -> Router {
    Router::new()
        .route("/", get(sso))
        .route("/sso", get(sso))
        .route("/return", get(sso_return))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "OK"
}

/// Stores the handshake nonce, then makes sure the caller is logged in before coming back to `/return`.
#[tracing::instrument(skip_all)]
pub async fn sso(
    State(state): State<SsoState>,
    SsoRequest { nonce }: SsoRequest,
    mut session: Session,
) -> Result<Response, SsoError> {
    session.state.nonce = Some(nonce);
    let set_cookie = session.save(&state.sessions).await?;

    let location = match session.state.user_id() {
        Some(user_id) => {
            tracing::debug!(user_id, "already logged in");
            state.config.return_url.clone()
        }
        None => delegate_login_url(&state).await?,
    };
    Ok(found(&location, set_cookie))
}

/// Signs the logged in user's claims and sends them to the forum.
#[tracing::instrument(skip_all)]
pub async fn sso_return(
    State(state): State<SsoState>,
    mut session: Session,
) -> Result<Response, SsoError> {
    let nonce = session
        .state
        .nonce
        .clone()
        .ok_or(ValidationError::MissingSessionNonce)?;
    let user_id = session
        .state
        .user_id()
        .ok_or(ValidationError::NotAuthenticated)?
        .to_string();

    let profile = state
        .authorization_api
        .get_user(&user_id)
        .await?
        .ok_or_else(|| SsoError::UserNotFound(user_id.clone()))?;
    let roles = state.authorization_api.get_user_roles(&user_id).await?;

    let claims = login_claims(nonce, user_id, profile, &roles);
    let location = forum_login_url(
        &state.config.discourse_base_url,
        &state.signer.build_login_string(&claims),
    );

    // spent
    session.state.nonce = None;
    let set_cookie = session.save(&state.sessions).await?;
    tracing::info!(external_id = %claims.external_id, admin = claims.admin, "login handed to forum");
    Ok(found(&location, set_cookie))
}

pub fn login_claims(
    nonce: String,
    user_id: String,
    profile: UserProfile,
    roles: &[Role],
) -> LoginClaims {
    let admin = profile.is_admin || roles.iter().any(|role| role.id == ADMIN_ROLE_ID);
    LoginClaims {
        nonce,
        external_id: user_id,
        username: profile.email.clone(),
        email: profile.email,
        name: profile.display_name,
        avatar_url: profile.photo_url,
        admin,
    }
}

async fn delegate_login_url(state: &SsoState) -> Result<Url, SsoError> {
    match &state.config.strategy {
        AuthenticationStrategy::RedirectDelegation => {
            let plugins = state.plugin_registry.plugins().await?;
            let plugin = select_plugin(
                &plugins,
                &state.config.plugin.key,
                state.config.target_plugin_key.as_deref(),
            )?;
            tracing::info!(plugin = %plugin.key, "not logged in, delegating to auth plugin");
            Ok(plugin_login_url(
                &state.config.external_url,
                &plugin.key,
                &state.config.return_url,
            ))
        }
        strategy @ AuthenticationStrategy::DirectIdp { .. } => {
            Err(ConfigurationError::NoLoginFlow(strategy.name()).into())
        }
    }
}

/// 302 to `location`, handing out the session cookie when there is one to set.
fn found(location: &Url, set_cookie: Option<Cookie<'static>>) -> Response {
    let mut response = (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response();
    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => tracing::error!("{err:?}"),
        }
    }
    response
}
