use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{errors::Error, Result};

/// Settings file, read from the working directory.
pub const SETTINGS_FILE: &str = "./setting.toml";

const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RELAY_USERNAME: &str = "makepadon";
const DEFAULT_RELAY_ICON: &str = ":elephant:";

/// Typed relay configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub server_confs: Vec<ServerConfig>,
    #[serde(rename = "slackWebHookURL")]
    pub slack_webhook_url: String,

    #[serde(default)]
    pub relay: RelayIdentity,

    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    #[serde(default)]
    pub on_auth_failure: FailurePolicy,
}

/// One streaming endpoint and its credentials.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(rename = "serverURL")]
    pub server_url: String,
    #[serde(rename = "streamingServerURL", default)]
    pub streaming_server_url: Option<String>,
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    pub account: String,
    pub password: String,
    #[serde(rename = "localOnly", default)]
    pub local_only: bool,
}

impl ServerConfig {
    /// Streaming base URL; servers without a separate streaming host use the API host.
    pub fn streaming_url(&self) -> &str {
        match self.streaming_server_url.as_deref() {
            Some(u) if !u.trim().is_empty() => u,
            _ => &self.server_url,
        }
    }
}

/// Name and icon the relay posts under.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayIdentity {
    #[serde(default = "default_relay_username")]
    pub username: String,
    #[serde(default = "default_relay_icon")]
    pub icon_emoji: String,
}

impl Default for RelayIdentity {
    fn default() -> Self {
        Self {
            username: default_relay_username(),
            icon_emoji: default_relay_icon(),
        }
    }
}

/// What a supervisor does when authentication or stream-open fails.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Retry with bounded exponential backoff.
    #[default]
    Retry,
    /// Give up on this server; others keep running.
    Stop,
}

impl Settings {
    /// Load settings from [`SETTINGS_FILE`].
    ///
    /// Returns `Ok(None)` when the file cannot be read at all.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        let Ok(raw) = fs::read_to_string(path) else {
            return Ok(None);
        };
        Self::parse(&raw).map(Some).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.slack_webhook_url.trim().is_empty() {
            return Err(Error::Config("slackWebHookURL is required".to_string()));
        }
        check_http_url("slackWebHookURL", &self.slack_webhook_url)?;
        if self.auth_timeout_secs == 0 {
            return Err(Error::Config(
                "authTimeoutSecs must be greater than zero".to_string(),
            ));
        }

        for (idx, server) in self.server_confs.iter().enumerate() {
            check_http_url(&format!("serverConfs[{idx}].serverURL"), &server.server_url)?;
            check_http_url(
                &format!("serverConfs[{idx}].streamingServerURL"),
                server.streaming_url(),
            )?;
        }

        Ok(())
    }
}

fn check_http_url(field: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("{field} is not a valid URL ({e}), got {raw:?}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::Config(format!(
            "{field} must be an http(s) URL, got {raw:?}"
        )));
    }
    Ok(())
}

fn default_auth_timeout_secs() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}

fn default_relay_username() -> String {
    DEFAULT_RELAY_USERNAME.to_string()
}

fn default_relay_icon() -> String {
    DEFAULT_RELAY_ICON.to_string()
}
