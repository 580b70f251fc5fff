use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Role id the authorization API gives to administrators.
pub const ADMIN_ROLE_ID: &str = "00000000-0000-0003-0000-000000000000";

/// Value of the session cookie, the key of a session record.
pub type SessionId = String;

/// The user token an auth plugin stores on login. Only `id` matters to us.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Passport's corner of the session, `{"passport":{"user":{..}}}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PassportState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedUser>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One session record. Auth plugins write the user under `passport.user`
/// (older records carry a top level `user`), we write `nonce`.
/// Anything else in the record belongs to other services and is written back untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport: Option<PassportState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthenticatedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionState {
    pub fn user_id(&self) -> Option<&str> {
        fn non_empty(user: &Option<AuthenticatedUser>) -> Option<&str> {
            user.as_ref()
                .map(|user| user.id.as_str())
                .filter(|id| !id.is_empty())
        }
        self.passport
            .as_ref()
            .and_then(|passport| non_empty(&passport.user))
            .or_else(|| non_empty(&self.user))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationMethod {
    #[serde(rename = "IDP-URI-REDIRECTION")]
    IdpUriRedirection,
    #[serde(rename = "PASSWORD")]
    Password,
    #[serde(rename = "QR-CODE")]
    QrCode,
    #[serde(other)]
    Other,
}

/// An identity plugin as listed by the gateway's plugin registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    pub authentication_method: AuthenticationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

impl PluginDescriptor {
    /// Only an explicit `isVisible: false` hides a plugin.
    pub fn is_hidden(&self) -> bool {
        self.is_visible == Some(false)
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    body: &[u8],
) -> Result<T, serde_path_to_error::Error<serde_json::Error>> {
    let deserializer = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(deserializer)
}
