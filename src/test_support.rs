use axum::body::Body;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use connect::ConnectSigner;
use cookie::Cookie;
use http_body_util::BodyExt;
use url::form_urlencoded;

use crate::session::SessionSettings;

/// `sso=..&sig=..` the way the forum sends it, for a raw (not yet base64) payload.
pub(crate) fn handshake_query(signer: &ConnectSigner, payload: &str) -> String {
    let sso = STANDARD.encode(payload);
    let sig = signer.sign(&sso);
    form_urlencoded::Serializer::new(String::new())
        .append_pair("sso", &sso)
        .append_pair("sig", &sig)
        .finish()
}

pub(crate) fn nonce_handshake(signer: &ConnectSigner, nonce: &str) -> String {
    handshake_query(
        signer,
        &format!(
            "nonce={nonce}&return_sso_url=https%3A%2F%2Fforum.example.com%2Fsession%2Fsso_login"
        ),
    )
}

pub(crate) async fn body_string(body: Body) -> String {
    String::from_utf8_lossy(&body.collect().await.unwrap().to_bytes()).into()
}

/// `name=value` pair for a signed session cookie, as a browser sends it back.
pub(crate) fn session_cookie(settings: &SessionSettings, session_id: &str) -> String {
    Cookie::new(
        settings.cookie.cookie_name.clone(),
        settings.signer.sign(session_id),
    )
    .encoded()
    .to_string()
}

/// Session id carried by a `Set-Cookie` header value.
pub(crate) fn set_cookie_session_id(settings: &SessionSettings, set_cookie: &str) -> String {
    let cookie = Cookie::parse_encoded(set_cookie).unwrap();
    assert_eq!(cookie.name(), settings.cookie.cookie_name);
    settings.signer.unsign(cookie.value()).unwrap().to_string()
}
