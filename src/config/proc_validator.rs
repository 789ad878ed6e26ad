//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks listener, upstream endpoint, retry, metrics and logging settings
//! - Requires at least one usable token source

use tracing::{error, info};

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::sources::{CredentialsConfig, ServiceConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_credentials(&cfg.credentials, &mut errors);

    if errors.is_empty() {
        info!("config is valid");
        Ok(())
    } else {
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port == 0 {
        errors.push("settings.server.port must be non-zero".to_string());
    }

    let url = settings.upstream.url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!(
            "settings.upstream.url '{}' must use ws:// or wss:// scheme",
            url
        ));
    }

    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }

    if settings.metrics.is_enabled {
        if !settings.metrics.path.starts_with('/') {
            errors.push(format!(
                "settings.metrics.path '{}' must start with '/'",
                settings.metrics.path
            ));
        }
        if settings.metrics.port == 0 {
            errors.push("settings.metrics.port must be non-zero".to_string());
        }
        if settings.metrics.host == settings.server.host
            && settings.metrics.port == settings.server.port
        {
            errors.push("settings.metrics must not share the relay listener address".to_string());
        }
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_credentials(credentials: &CredentialsConfig, errors: &mut Vec<String>) {
    let gcloud_enabled = credentials
        .gcloud
        .as_ref()
        .map(|g| g.enabled)
        .unwrap_or(false);

    if credentials.service_account.is_none() && !gcloud_enabled {
        errors.push(
            "credentials: at least one of 'service_account' or enabled 'gcloud' is required"
                .to_string(),
        );
    }

    if let Some(sa) = &credentials.service_account {
        if sa.path.trim().is_empty() {
            errors.push("credentials.service_account.path must not be empty".to_string());
        }
        if let Some(uri) = &sa.token_uri {
            if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                errors.push(format!(
                    "credentials.service_account.token_uri '{}' must be an http(s) URL",
                    uri
                ));
            }
        }
    }

    if let Some(gcloud) = credentials.gcloud.as_ref().filter(|g| g.enabled) {
        if gcloud.command.trim().is_empty() {
            errors.push("credentials.gcloud.command must not be empty".to_string());
        }
        if gcloud.assumed_lifetime_seconds == 0 {
            errors.push("credentials.gcloud.assumed_lifetime_seconds must be > 0".to_string());
        }
    }
}
