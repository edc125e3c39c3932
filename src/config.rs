//! Provider configuration.
//!
//! Each setting may come from the provider block or from the environment;
//! the block wins.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment fallback for `address`.
pub const ADDRESS_ENV: &str = "TEAMCITY_ADDR";
/// Environment fallback for `username`.
pub const USERNAME_ENV: &str = "TEAMCITY_USER";
/// Environment fallback for `password`.
pub const PASSWORD_ENV: &str = "TEAMCITY_PASSWORD";

/// Resolved connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Server base URL, e.g. `https://teamcity.example.com`.
    pub address: String,
    /// Account used for basic authentication.
    pub username: String,
    /// Password or access token for `username`.
    pub password: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawProviderConfig {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "address",
                Attribute::optional_string().with_description(format!(
                    "TeamCity server URL. Defaults to ${}.",
                    ADDRESS_ENV
                )),
            )
            .with_attribute(
                "username",
                Attribute::optional_string()
                    .with_description(format!("Login name. Defaults to ${}.", USERNAME_ENV)),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("Password or token. Defaults to ${}.", PASSWORD_ENV)),
            )
    }

    /// Resolve configuration from the provider block, falling back to the
    /// process environment.
    pub fn resolve(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve_with(
        config: &Value,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Vec<Diagnostic>> {
        let raw: RawProviderConfig = match config {
            Value::Null => RawProviderConfig::default(),
            other => serde_json::from_value(other.clone()).map_err(|e| {
                vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
            })?,
        };

        let mut diagnostics = Vec::new();
        let mut setting = |value: Option<String>, attribute: &str, env: &str| {
            let resolved = value
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(env).filter(|v| !v.is_empty()));
            if resolved.is_none() {
                diagnostics.push(
                    Diagnostic::error(format!("Missing provider setting '{}'", attribute))
                        .with_detail(format!(
                            "Set '{}' or the {} environment variable",
                            attribute, env
                        ))
                        .with_attribute(attribute),
                );
            }
            resolved.unwrap_or_default()
        };

        let address = setting(raw.address, "address", ADDRESS_ENV);
        let username = setting(raw.username, "username", USERNAME_ENV);
        let password = setting(raw.password, "password", PASSWORD_ENV);

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(Self {
            address: address.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_from_block() {
        let config = ProviderConfig::resolve_with(
            &json!({"address": "https://tc.example.com/", "username": "admin", "password": "pw"}),
            no_env,
        )
        .unwrap();
        assert_eq!(config.address, "https://tc.example.com");
        assert_eq!(config.username, "admin");
    }

    #[test]
    fn test_resolve_from_env() {
        let config = ProviderConfig::resolve_with(&json!({"username": "ci"}), |key| match key {
            ADDRESS_ENV => Some("http://localhost:8111".to_string()),
            USERNAME_ENV => Some("ignored".to_string()),
            PASSWORD_ENV => Some("token".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.address, "http://localhost:8111");
        assert_eq!(config.username, "ci");
        assert_eq!(config.password, "token");
    }

    #[test]
    fn test_missing_settings() {
        let diagnostics = ProviderConfig::resolve_with(&Value::Null, no_env).unwrap_err();
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].attribute, Some("address".to_string()));

        let diagnostics = ProviderConfig::resolve_with(
            &json!({"address": "", "username": "u", "password": "p"}),
            no_env,
        )
        .unwrap_err();
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_invalid_block() {
        let diagnostics =
            ProviderConfig::resolve_with(&json!({"address": 8111}), no_env).unwrap_err();
        assert_eq!(diagnostics[0].summary, "Invalid provider configuration");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ProviderConfig {
            address: "a".to_string(),
            username: "u".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
