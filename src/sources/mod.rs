/// Sources module
///
/// Defines the supported token sources and builds the ordered chain from config.
use std::path::Path;

use anyhow::Result;
use reqwest::Client;

use crate::cache::token::Token;
use crate::config::credentials::load_credential;
use crate::config::sources::CredentialsConfig;
use crate::error::ConfigError;
use crate::utils::constants::{SOURCE_GCLOUD, SOURCE_SERVICE_ACCOUNT};

pub mod gcloud;
pub mod service_account;

use gcloud::GcloudSource;
use service_account::ServiceAccountSource;

pub trait FetchToken {
    fn fetch_token(&self) -> impl std::future::Future<Output = Result<Token>> + Send;
}

#[derive(Debug, Clone)]
pub enum TokenSource {
    ServiceAccount(ServiceAccountSource),
    Gcloud(GcloudSource),
}

impl TokenSource {
    pub fn name(&self) -> &'static str {
        match self {
            TokenSource::ServiceAccount(_) => SOURCE_SERVICE_ACCOUNT,
            TokenSource::Gcloud(_) => SOURCE_GCLOUD,
        }
    }
}

impl FetchToken for TokenSource {
    async fn fetch_token(&self) -> Result<Token> {
        match self {
            TokenSource::ServiceAccount(s) => s.fetch_token().await,
            TokenSource::Gcloud(s) => s.fetch_token().await,
        }
    }
}

/// Build sources in chain order: service account first, gcloud second
pub fn build_sources(cfg: &CredentialsConfig, client: &Client) -> Result<Vec<TokenSource>, ConfigError> {
    let mut sources = Vec::with_capacity(2);

    if let Some(sa_cfg) = &cfg.service_account {
        let mut credential = load_credential(Path::new(&sa_cfg.path))?;
        if let Some(token_uri) = &sa_cfg.token_uri {
            credential.token_uri = token_uri.to_owned();
        }
        sources.push(TokenSource::ServiceAccount(ServiceAccountSource::new(
            credential,
            client.clone(),
        )?));
    }

    if let Some(gcloud_cfg) = cfg.gcloud.as_ref().filter(|g| g.enabled) {
        sources.push(TokenSource::Gcloud(GcloudSource::new(
            gcloud_cfg.command.to_owned(),
            gcloud_cfg.assumed_lifetime_seconds,
        )));
    }

    if sources.is_empty() {
        return Err(ConfigError::NoTokenSources);
    }
    Ok(sources)
}
