/*
    Discourse Connect signing.
    The forum sends us `sso` (a base64 encoded query string) and `sig` (hex HMAC-SHA256 of `sso` under the shared secret).
    We answer the same way: url encode the login claims, base64 them, sign the base64.
*/
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac_sha256::HMAC;
use std::{fmt, sync::Arc};
use subtle::ConstantTimeEq;
use url::form_urlencoded;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Required discourse connect secret can't be empty!")]
    EmptySecret,
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Missing nonce in payload!")]
    MissingNonce,
}

/// Claims we hand back to the forum after a successful login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginClaims {
    pub nonce: String,
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub admin: bool,
}

#[derive(Clone)]
pub struct ConnectSigner {
    secret: Arc<String>,
}

impl fmt::Debug for ConnectSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectSigner").finish_non_exhaustive()
    }
}

impl ConnectSigner {
    pub fn new(secret: impl Into<String>) -> Result<Self, SignerError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }
        Ok(Self {
            secret: Arc::new(secret),
        })
    }

    /// Lowercase hex HMAC-SHA256 of `payload`.
    pub fn sign(&self, payload: &str) -> String {
        hex::encode(HMAC::mac(payload.as_bytes(), self.secret.as_bytes()))
    }

    /// True when `sig` is the signature of `payload`. Only lowercase hex validates, as the forum sends it.
    #[tracing::instrument(skip_all)]
    pub fn validate(&self, payload: &str, sig: &str) -> bool {
        if !sig.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return false;
        }
        let Ok(signature) = hex::decode(sig) else {
            return false;
        };
        let mac = HMAC::mac(payload.as_bytes(), self.secret.as_bytes());
        mac.as_slice().ct_eq(signature.as_slice()).into()
    }

    /// Reads the nonce out of an (already validated) payload.
    pub fn nonce(&self, payload: &str) -> Result<String, SignerError> {
        // some forum versions wrap the base64 at 60 columns
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let decoded = STANDARD.decode(compact)?;
        form_urlencoded::parse(&decoded)
            .find(|(key, _)| key == "nonce")
            .map(|(_, nonce)| nonce.into_owned())
            .filter(|nonce| !nonce.is_empty())
            .ok_or(SignerError::MissingNonce)
    }

    /// Serializes and signs `claims`, returning `sso=<payload>&sig=<signature>`.
    pub fn build_login_string(&self, claims: &LoginClaims) -> String {
        let mut fields = form_urlencoded::Serializer::new(String::new());
        fields
            .append_pair("nonce", &claims.nonce)
            .append_pair("external_id", &claims.external_id)
            .append_pair("email", &claims.email)
            .append_pair("username", &claims.username)
            .append_pair("name", &claims.name);
        if let Some(avatar_url) = &claims.avatar_url {
            fields.append_pair("avatar_url", avatar_url);
        }
        fields.append_pair("admin", if claims.admin { "true" } else { "false" });

        let payload = STANDARD.encode(fields.finish());
        let sig = self.sign(&payload);
        form_urlencoded::Serializer::new(String::new())
            .append_pair("sso", &payload)
            .append_pair("sig", &sig)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn signer() -> ConnectSigner {
        ConnectSigner::new("42").unwrap()
    }

    fn claims() -> LoginClaims {
        LoginClaims {
            nonce: "N1".to_string(),
            external_id: "u1".to_string(),
            email: "a@b.com".to_string(),
            username: "a@b.com".to_string(),
            name: "A B".to_string(),
            avatar_url: Some("http://x/p.png".to_string()),
            admin: false,
        }
    }

    fn pairs(query: &[u8]) -> HashMap<String, String> {
        form_urlencoded::parse(query).into_owned().collect()
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            ConnectSigner::new(""),
            Err(SignerError::EmptySecret)
        ));
    }

    #[test]
    fn sign_is_hex_hmac_sha256() {
        assert_eq!(
            signer().sign(r#"{"action":"hello world"}"#),
            "8b99afd7996c3e3c291a0b54399bacb72016bdb088071de42d1d7156a6a4273d"
        );
    }

    #[test]
    fn validate_accepts_matching_signature() {
        let payload = STANDARD.encode("nonce=N1&return_sso_url=http%3A%2F%2Fforum%2Fsession%2Fsso_login");
        let sig = signer().sign(&payload);
        assert!(signer().validate(&payload, &sig));
    }

    #[test]
    fn validate_rejects_mismatch() {
        let payload = STANDARD.encode("nonce=N1");
        let sig = signer().sign(&payload);
        assert!(!signer().validate(&STANDARD.encode("nonce=N2"), &sig));
        assert!(!ConnectSigner::new("other").unwrap().validate(&payload, &sig));
        assert!(!signer().validate(&payload, "01"));
    }

    #[test]
    fn validate_rejects_malformed_hex() {
        assert!(!signer().validate("abc", "xyz"));
        assert!(!signer().validate("abc", ""));
    }

    #[test]
    fn validate_rejects_uppercase_hex() {
        let sig = signer().sign("abc");
        assert!(signer().validate("abc", &sig));
        assert!(!signer().validate("abc", &sig.to_uppercase()));
        assert!(!signer().validate("abc", &format!(" {sig}")));
    }

    #[test]
    fn nonce_is_read_from_payload() {
        let payload = STANDARD.encode("nonce=cb68251eefb5211e58c00ff1395f0c0b&return_sso_url=http%3A%2F%2Fforum");
        assert_eq!(
            signer().nonce(&payload).unwrap(),
            "cb68251eefb5211e58c00ff1395f0c0b"
        );
    }

    #[test]
    fn nonce_tolerates_wrapped_base64() {
        let payload = STANDARD.encode("nonce=N1&return_sso_url=http%3A%2F%2Fforum.example.com%2Fsession%2Fsso_login");
        let (head, tail) = payload.split_at(20);
        assert_eq!(signer().nonce(&format!("{head}\n{tail}\n")).unwrap(), "N1");
    }

    #[test]
    fn missing_nonce_is_an_error() {
        let payload = STANDARD.encode("return_sso_url=http%3A%2F%2Fforum");
        assert!(matches!(
            signer().nonce(&payload),
            Err(SignerError::MissingNonce)
        ));
        assert!(matches!(
            signer().nonce(&STANDARD.encode("nonce=")),
            Err(SignerError::MissingNonce)
        ));
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(matches!(
            signer().nonce("not base64!"),
            Err(SignerError::Base64(_))
        ));
    }

    #[test]
    fn login_string_is_signed_and_carries_claims() {
        let login = signer().build_login_string(&claims());
        let outer = pairs(login.as_bytes());
        let payload = &outer["sso"];
        assert!(signer().validate(payload, &outer["sig"]));

        let inner = pairs(&STANDARD.decode(payload).unwrap());
        assert_eq!(inner["nonce"], "N1");
        assert_eq!(inner["external_id"], "u1");
        assert_eq!(inner["email"], "a@b.com");
        assert_eq!(inner["username"], "a@b.com");
        assert_eq!(inner["name"], "A B");
        assert_eq!(inner["avatar_url"], "http://x/p.png");
        assert_eq!(inner["admin"], "false");
    }

    #[test]
    fn login_string_omits_absent_avatar() {
        let login = signer().build_login_string(&LoginClaims {
            avatar_url: None,
            admin: true,
            ..claims()
        });
        let outer = pairs(login.as_bytes());
        let inner = pairs(&STANDARD.decode(&outer["sso"]).unwrap());
        assert!(!inner.contains_key("avatar_url"));
        assert_eq!(inner["admin"], "true");
    }

    #[test]
    fn login_string_is_deterministic() {
        assert_eq!(
            signer().build_login_string(&claims()),
            signer().build_login_string(&claims())
        );
    }
}
