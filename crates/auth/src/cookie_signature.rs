/*
    Session cookies carry `s:<session id>.<signature>`, signed the way express-session signs them,
    so the gateway and every auth plugin agree on which record a browser owns.
    The signature is unpadded base64 of HMAC-SHA256(secret, session id).
*/
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use hmac_sha256::HMAC;
use std::{fmt, sync::Arc};
use subtle::ConstantTimeEq;

const SIGNED_PREFIX: &str = "s:";

#[derive(Clone)]
pub struct CookieSigner {
    secret: Arc<str>,
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

impl CookieSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    /// Cookie value for `session_id`.
    pub fn sign(&self, session_id: &str) -> String {
        format!("{SIGNED_PREFIX}{session_id}.{}", self.mac(session_id))
    }

    /// The session id inside a cookie value, if we (or the gateway) signed it.
    pub fn unsign<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (session_id, mac) = value.strip_prefix(SIGNED_PREFIX)?.rsplit_once('.')?;
        let expected = self.mac(session_id);
        bool::from(expected.as_bytes().ct_eq(mac.as_bytes())).then_some(session_id)
    }

    fn mac(&self, value: &str) -> String {
        STANDARD_NO_PAD.encode(HMAC::mac(value.as_bytes(), self.secret.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_express_signatures() {
        let signer = CookieSigner::new("tobiiscool");
        assert_eq!(
            signer.sign("hello"),
            "s:hello.DGDUkGlIkCzPz+C0B064FNgHdEjox7ch8tOBGslZ5QI"
        );
    }

    #[test]
    fn unsign_returns_the_session_id() {
        let signer = CookieSigner::new("session-secret");
        let value = signer.sign("4f9c2b1e-0000-4000-8000-000000000000");
        assert_eq!(
            signer.unsign(&value),
            Some("4f9c2b1e-0000-4000-8000-000000000000")
        );
    }

    #[test]
    fn ids_containing_dots_survive() {
        let signer = CookieSigner::new("session-secret");
        assert_eq!(signer.unsign(&signer.sign("a.b.c")), Some("a.b.c"));
    }

    #[test]
    fn tampered_or_unsigned_values_are_refused() {
        let signer = CookieSigner::new("session-secret");
        let value = signer.sign("sid");
        assert_eq!(CookieSigner::new("other-secret").unsign(&value), None);
        assert_eq!(signer.unsign(&value.replacen("sid", "sie", 1)), None);
        assert_eq!(signer.unsign(&value[2..]), None);
        assert_eq!(signer.unsign("sid"), None);
        assert_eq!(signer.unsign("s:sid"), None);
        assert_eq!(signer.unsign("s:sid."), None);
    }
}
