use auth::data_model::AuthenticationMethod;
use serde::Deserialize;
use std::{fmt, path::Path};
use url::Url;

use crate::urls::absolute_url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("config file is not valid toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Required {0} can't be empty!")]
    Missing(&'static str),
    #[error("{field} is not a valid url: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
    #[error("{field} `{value}` cannot be used in a Set-Cookie header")]
    InvalidCookie { field: &'static str, value: String },
}

/// This plugin's own entry in the gateway's plugin list.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct AuthPluginConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_authentication_method")]
    pub authentication_method: AuthenticationMethod,
}

impl AuthPluginConfig {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(self.key.as_str())
    }
}

/// How a caller who isn't logged in yet gets authenticated.
#[derive(Clone, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthenticationStrategy {
    /// Hand the caller to another installed plugin, it sends them back to `/return`.
    #[default]
    RedirectDelegation,
    /// Placeholder for a plugin that talks to an IDP itself. It has no login flow.
    DirectIdp {
        client_id: String,
        client_secret: String,
    },
}

impl AuthenticationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            AuthenticationStrategy::RedirectDelegation => "redirect-delegation",
            AuthenticationStrategy::DirectIdp { .. } => "direct-idp",
        }
    }
}

impl fmt::Debug for AuthenticationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationStrategy::RedirectDelegation => f.write_str("RedirectDelegation"),
            AuthenticationStrategy::DirectIdp { client_id, .. } => f
                .debug_struct("DirectIdp")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Session cookie options, shared with the gateway and the other auth plugins.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure: false,
            path: default_cookie_path(),
            domain: None,
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, value: &str| ConfigError::InvalidCookie {
            field,
            value: value.to_string(),
        };
        if self.cookie_name.is_empty() || !self.cookie_name.bytes().all(is_cookie_name_byte) {
            return Err(invalid("session.cookie_name", &self.cookie_name));
        }
        if !self.path.starts_with('/') || !self.path.bytes().all(is_attribute_byte) {
            return Err(invalid("session.path", &self.path));
        }
        if let Some(domain) = &self.domain {
            if domain.is_empty() || !domain.bytes().all(is_attribute_byte) {
                return Err(invalid("session.domain", domain));
            }
        }
        Ok(())
    }
}

/// RFC 6265 token: visible ascii minus separators.
fn is_cookie_name_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !br#"()<>@,;:\"/[]?={}"#.contains(&byte)
}

fn is_attribute_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && byte != b';'
}

#[derive(Clone, Deserialize, Debug)]
pub struct PluginConfigDeserialize {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_external_url")]
    pub external_url: String,
    #[serde(default)]
    pub discourse_base_url: String,
    /// falls back to DISCOURSE_CONNECT_SECRET
    pub discourse_connect_secret: Option<String>,
    /// Signs session cookies, shared with the gateway. Falls back to SESSION_SECRET.
    pub session_secret: Option<String>,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_auth_api_url")]
    pub auth_api_url: String,
    /// falls back to JWT_SECRET
    pub jwt_secret: Option<String>,
    /// falls back to USER_ID
    pub user_id: Option<String>,
    /// Always delegate to this plugin instead of the first one the registry lists.
    pub target_plugin_key: Option<String>,
    /// Sessions live in process memory when unset.
    pub redis_url: Option<String>,
    #[serde(default)]
    pub session: SessionConfig,
    pub plugin: AuthPluginConfig,
    #[serde(default)]
    pub strategy: AuthenticationStrategy,
}

#[derive(Clone)]
pub struct PluginConfig {
    pub listen_addr: String,
    pub external_url: Url,
    pub discourse_base_url: Url,
    pub discourse_connect_secret: String,
    pub session_secret: String,
    pub gateway_url: Url,
    pub auth_api_url: Url,
    pub jwt_secret: String,
    pub user_id: String,
    pub target_plugin_key: Option<String>,
    pub redis_url: Option<String>,
    pub session: SessionConfig,
    pub plugin: AuthPluginConfig,
    pub strategy: AuthenticationStrategy,
    /// Where other plugins send the caller back to, `<external_url>/auth/login/plugin/<key>/return`.
    pub return_url: Url,
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("listen_addr", &self.listen_addr)
            .field("external_url", &self.external_url.as_str())
            .field("discourse_base_url", &self.discourse_base_url.as_str())
            .field("gateway_url", &self.gateway_url.as_str())
            .field("auth_api_url", &self.auth_api_url.as_str())
            .field("user_id", &self.user_id)
            .field("target_plugin_key", &self.target_plugin_key)
            .field("session", &self.session)
            .field("plugin", &self.plugin)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl PluginConfig {
    /// Reads and validates the toml config at `path`, taking missing secrets from the environment.
    #[tracing::instrument(err)]
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config: PluginConfigDeserialize = toml::from_str(&contents)?;
        Self::new(config, |name| std::env::var(name).ok())
    }

    pub fn new(
        other: PluginConfigDeserialize,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |value: Option<String>, env_name: &str, field: &'static str| {
            value
                .or_else(|| env(env_name))
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(field))
        };

        if other.discourse_base_url.is_empty() {
            return Err(ConfigError::Missing("discourse_base_url"));
        }
        if other.plugin.key.is_empty() {
            return Err(ConfigError::Missing("plugin.key"));
        }
        let discourse_connect_secret = required(
            other.discourse_connect_secret,
            "DISCOURSE_CONNECT_SECRET",
            "discourse_connect_secret",
        )?;
        let jwt_secret = required(other.jwt_secret, "JWT_SECRET", "jwt_secret")?;
        let user_id = required(other.user_id, "USER_ID", "user_id")?;
        let session_secret = required(other.session_secret, "SESSION_SECRET", "session_secret")?;
        other.session.validate()?;

        let external_url = parse_url("external_url", &other.external_url)?;
        let return_url = absolute_url(
            &format!("/auth/login/plugin/{}/return", other.plugin.key),
            &external_url,
        );

        Ok(PluginConfig {
            listen_addr: other.listen_addr,
            discourse_base_url: parse_url("discourse_base_url", &other.discourse_base_url)?,
            discourse_connect_secret,
            session_secret,
            gateway_url: parse_url("gateway_url", &other.gateway_url)?,
            auth_api_url: parse_url("auth_api_url", &other.auth_api_url)?,
            jwt_secret,
            user_id,
            target_plugin_key: other.target_plugin_key.filter(|key| !key.is_empty()),
            redis_url: other.redis_url.filter(|url| !url.is_empty()),
            session: other.session,
            plugin: other.plugin,
            strategy: other.strategy,
            external_url,
            return_url,
        })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let config: PluginConfigDeserialize = toml::from_str(
            r#"
external_url = "http://localhost:6100"
discourse_base_url = "https://forum.example.com"
discourse_connect_secret = "connect-secret"
jwt_secret = "jwt-secret"
session_secret = "session-secret"
user_id = "00000000-0000-4000-8000-000000000000"

[plugin]
key = "discourse"
name = "Discourse"
        "#,
        )
        .expect("test config to be valid toml");
        Self::new(config, |_| None).expect("test config to be complete")
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn default_listen_addr() -> String {
    "0.0.0.0:6201".to_string()
}
fn default_external_url() -> String {
    "http://localhost:6100".to_string()
}
fn default_gateway_url() -> String {
    "http://gateway".to_string()
}
fn default_auth_api_url() -> String {
    "http://localhost:6104/v0".to_string()
}
fn default_cookie_name() -> String {
    "session_id".to_string()
}
fn default_cookie_path() -> String {
    "/".to_string()
}
fn default_session_ttl_secs() -> u64 {
    60 * 60 * 24
}
fn default_authentication_method() -> AuthenticationMethod {
    AuthenticationMethod::IdpUriRedirection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deserialize(raw: &str) -> PluginConfigDeserialize {
        toml::from_str(raw).expect("valid toml")
    }

    const MINIMAL: &str = r#"
discourse_base_url = "https://forum.example.com"
[plugin]
key = "discourse"
"#;

    #[test]
    fn defaults_fill_the_gaps() {
        let config = PluginConfig::new(deserialize(MINIMAL), |name| match name {
            "DISCOURSE_CONNECT_SECRET" => Some("connect-secret".to_string()),
            "JWT_SECRET" => Some("jwt-secret".to_string()),
            "USER_ID" => Some("service-user".to_string()),
            "SESSION_SECRET" => Some("session-secret".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:6201");
        assert_eq!(config.gateway_url.as_str(), "http://gateway/");
        assert_eq!(config.auth_api_url.as_str(), "http://localhost:6104/v0");
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.session.cookie_name, "session_id");
        assert_eq!(config.strategy, AuthenticationStrategy::RedirectDelegation);
        assert_eq!(
            config.plugin.authentication_method,
            AuthenticationMethod::IdpUriRedirection
        );
        assert_eq!(config.discourse_connect_secret, "connect-secret");
        assert_eq!(config.session_secret, "session-secret");
        assert_eq!(config.session.path, "/");
        assert_eq!(config.plugin.display_name(), "discourse");
        assert!(config.redis_url.is_none());
        assert!(config.target_plugin_key.is_none());
    }

    #[test]
    fn return_url_is_under_external_url() {
        let config = PluginConfig::new_test();
        assert_eq!(
            config.return_url.as_str(),
            "http://localhost:6100/auth/login/plugin/discourse/return"
        );
    }

    #[test]
    fn file_secret_wins_over_environment() {
        let mut raw = deserialize(MINIMAL);
        raw.discourse_connect_secret = Some("from-file".to_string());
        let config = PluginConfig::new(raw, |_| Some("from-env".to_string())).unwrap();
        assert_eq!(config.discourse_connect_secret, "from-file");
        assert_eq!(config.jwt_secret, "from-env");
    }

    #[test]
    fn missing_connect_secret_is_refused() {
        let result = PluginConfig::new(deserialize(MINIMAL), |name| match name {
            "JWT_SECRET" | "USER_ID" => Some("x".to_string()),
            _ => None,
        });
        assert!(matches!(
            result,
            Err(ConfigError::Missing("discourse_connect_secret"))
        ));
    }

    #[test]
    fn missing_session_secret_is_refused() {
        let result = PluginConfig::new(deserialize(MINIMAL), |name| match name {
            "DISCOURSE_CONNECT_SECRET" | "JWT_SECRET" | "USER_ID" => Some("x".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(ConfigError::Missing("session_secret"))));
    }

    #[test]
    fn cookie_options_must_fit_in_a_header() {
        for (table, field) in [
            ("cookie_name = \"session id\"", "session.cookie_name"),
            ("cookie_name = \"sess;ion\"", "session.cookie_name"),
            ("cookie_name = \"sessión\"", "session.cookie_name"),
            ("cookie_name = \"\"", "session.cookie_name"),
            ("path = \"auth\"", "session.path"),
            ("domain = \"example.com; HttpOnly\"", "session.domain"),
        ] {
            let raw = deserialize(&format!("{MINIMAL}\n[session]\n{table}\n"));
            match PluginConfig::new(raw, |_| Some("x".to_string())) {
                Err(ConfigError::InvalidCookie { field: bad, .. }) => assert_eq!(bad, field),
                other => panic!("expected {table} to be refused, got {other:?}"),
            }
        }
    }

    #[test]
    fn plugin_name_falls_back_to_key() {
        let config = PluginConfig::new_test();
        assert_eq!(config.plugin.display_name(), "Discourse");
        let mut plugin = config.plugin.clone();
        plugin.name = Some(String::new());
        assert_eq!(plugin.display_name(), "discourse");
    }

    #[test]
    fn empty_forum_url_is_refused() {
        let raw = deserialize(
            r#"
discourse_base_url = ""
[plugin]
key = "discourse"
"#,
        );
        let result = PluginConfig::new(raw, |_| Some("x".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::Missing("discourse_base_url"))
        ));
    }

    #[test]
    fn bad_url_names_the_field() {
        let mut raw = deserialize(MINIMAL);
        raw.external_url = "not a url".to_string();
        let result = PluginConfig::new(raw, |_| Some("x".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidUrl {
                field: "external_url",
                ..
            })
        ));
    }

    #[test]
    fn strategy_and_session_tables() {
        let raw = deserialize(
            r#"
discourse_base_url = "https://forum.example.com"
target_plugin_key = "google"
redis_url = "redis://127.0.0.1/"

[session]
cookie_name = "connect.sid"
secure = true
domain = ".example.com"

[plugin]
key = "discourse"
authentication_method = "IDP-URI-REDIRECTION"

[strategy]
type = "direct-idp"
client_id = "my-client"
client_secret = "shh"
"#,
        );
        let config = PluginConfig::new(raw, |_| Some("x".to_string())).unwrap();
        assert_eq!(config.target_plugin_key.as_deref(), Some("google"));
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.session.cookie_name, "connect.sid");
        assert!(config.session.secure);
        assert_eq!(config.session.domain.as_deref(), Some(".example.com"));
        assert_eq!(config.session.ttl_secs, 60 * 60 * 24);
        assert_eq!(config.strategy.name(), "direct-idp");
        assert!(!format!("{:?}", config.strategy).contains("shh"));
        assert!(!format!("{config:?}").contains("jwt"));
    }
}
