use serde::Deserialize;

use crate::config::settings::SettingsConfig;
use crate::utils::constants::{DEFAULT_GCLOUD_COMMAND, DEFAULT_GCLOUD_LIFETIME_SECS};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub credentials: CredentialsConfig,
}

/// ================================
/// Token sources, tried in order:
/// service account first, gcloud second
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    pub service_account: Option<ServiceAccountSourceConfig>,
    pub gcloud: Option<GcloudSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceAccountSourceConfig {
    /// path to the service account JSON document
    pub path: String,
    /// overrides `token_uri` from the document
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GcloudSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gcloud_command")]
    pub command: String,
    /// the CLI prints no expiry, so the token is assumed to live this long
    #[serde(default = "default_gcloud_lifetime")]
    pub assumed_lifetime_seconds: u64,
}

fn default_gcloud_command() -> String {
    DEFAULT_GCLOUD_COMMAND.to_owned()
}

fn default_gcloud_lifetime() -> u64 {
    DEFAULT_GCLOUD_LIFETIME_SECS
}
