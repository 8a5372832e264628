//! OAuth authorized-user credentials carried in a base64 environment blob.
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

use crate::config::{ConfigError, ENV_TOKEN_JSON};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens closer than this to expiry are refreshed before use.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub token: Option<String>,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("expiry", &self.expiry)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Decode the base64 authorized-user JSON.
    pub fn from_base64(blob: &str) -> Result<Self, ConfigError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(blob.trim())
            .map_err(|e| ConfigError::Credential(format!("invalid base64: {e}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| ConfigError::Credential(format!("token is not UTF-8: {e}")))?;
        let creds: Credentials = serde_json::from_str(&json)
            .map_err(|e| ConfigError::Credential(format!("invalid token JSON: {e}")))?;
        for (name, value) in [
            ("refresh_token", &creds.refresh_token),
            ("client_id", &creds.client_id),
            ("client_secret", &creds.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Credential(format!("{name} is empty")));
            }
        }
        Ok(creds)
    }

    /// Read and decode `YOUTUBE_TOKEN_JSON` through `lookup`.
    pub fn from_env<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let blob = lookup(ENV_TOKEN_JSON)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnv(ENV_TOKEN_JSON))?;
        Self::from_base64(&blob)
    }

    /// The stored access token, if it is still usable at `now`.
    pub fn usable_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        match self.expiry {
            Some(expiry) if expiry - Duration::seconds(EXPIRY_SLACK_SECS) > now => Some(token),
            _ => None,
        }
    }
}
