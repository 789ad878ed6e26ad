//! Process-wide bearer token provider.
//!
//! One instance is shared by every session. A cached token is handed out
//! while its expiry is in the future; otherwise exactly one caller performs
//! the refresh while the others wait on the cache's refresh gate and then
//! reuse its result.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::cache::token::Token;
use crate::cache::token_cache::TokenCache;
use crate::config::sources::ServiceConfig;
use crate::error::{AuthError, ConfigError};
use crate::helpers::time::{get_instant, now_u64};
use crate::observability::events::RelayObserver;
use crate::resilience::retry::RetrySettings;
use crate::sources::{build_sources, FetchToken, TokenSource};
use crate::utils::constants::DEFAULT_SAFETY_MARGIN_SECS;

pub struct TokenProvider {
    sources: Vec<TokenSource>,
    cache: TokenCache,
    safety_margin_seconds: u64,
    retry: RetrySettings,
    observer: Arc<dyn RelayObserver>,
}

impl TokenProvider {
    pub fn new(sources: Vec<TokenSource>, observer: Arc<dyn RelayObserver>) -> Self {
        Self {
            sources,
            cache: TokenCache::new(),
            safety_margin_seconds: DEFAULT_SAFETY_MARGIN_SECS,
            retry: RetrySettings::default(),
            observer,
        }
    }

    /// Build the source chain from config. Fails when a credential cannot be
    /// loaded; no partially usable provider is returned.
    pub fn from_config(
        service_config: &ServiceConfig,
        client: &Client,
        observer: Arc<dyn RelayObserver>,
    ) -> Result<Self, ConfigError> {
        let sources = build_sources(&service_config.credentials, client)?;
        info!(
            "token provider initialised with sources {:?}",
            sources.iter().map(|s| s.name()).collect::<Vec<_>>()
        );
        let settings = &service_config.settings;
        Ok(Self::new(sources, observer)
            .with_safety_margin(settings.safety_margin_seconds())
            .with_retry(RetrySettings::from_config(settings.retry.as_ref())))
    }

    pub fn with_safety_margin(mut self, safety_margin_seconds: u64) -> Self {
        self.safety_margin_seconds = safety_margin_seconds;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// A bearer token whose expiry is strictly in the future.
    ///
    /// Serves the cache without network activity when possible, otherwise
    /// refreshes. A failed refresh leaves the previous cache untouched.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cache.get_fresh(now_u64()).await {
            return Ok(token.value);
        }

        let _gate = self.cache.lock_refresh().await;

        // another caller may have refreshed while we waited
        if let Some(token) = self.cache.get_fresh(now_u64()).await {
            debug!("using token refreshed by a concurrent caller");
            return Ok(token.value);
        }

        let token = self.refresh_locked().await?;
        Ok(token.value)
    }

    /// True when a token is cached and its expiry minus the safety margin is
    /// still ahead; a session that must outlive the token should refresh
    /// when this turns false.
    pub async fn is_valid(&self) -> bool {
        self.cache
            .is_valid_at(now_u64(), self.safety_margin_seconds)
            .await
    }

    /// Unconditional refresh, serialized with every other refresh.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let _gate = self.cache.lock_refresh().await;
        let token = self.refresh_locked().await?;
        Ok(token.value)
    }

    /// Like [`get_token`](Self::get_token), but refreshes ahead of expiry
    /// once the cached token is inside the safety margin. If that early
    /// refresh fails, the still-fresh cached token is served instead.
    pub async fn get_token_for_session(&self) -> Result<String, AuthError> {
        if self.is_valid().await {
            return self.get_token().await;
        }

        let _gate = self.cache.lock_refresh().await;
        let now = now_u64();
        if let Some(token) = self
            .cache
            .get_fresh(now)
            .await
            .filter(|t| t.is_valid_at(now, self.safety_margin_seconds))
        {
            return Ok(token.value);
        }

        match self.refresh_locked().await {
            Ok(token) => Ok(token.value),
            Err(e) => match self.cache.get_fresh(now_u64()).await {
                Some(token) => {
                    warn!("early refresh failed, using cached token until it expires: {}", e);
                    Ok(token.value)
                }
                None => Err(e),
            },
        }
    }

    pub fn safety_margin_seconds(&self) -> u64 {
        self.safety_margin_seconds
    }

    // caller holds the refresh gate
    async fn refresh_locked(&self) -> Result<Token, AuthError> {
        let start = get_instant();

        if self.sources.is_empty() {
            let err = AuthError::NoSources;
            self.observer.token_refresh_failed(&err, start.elapsed());
            return Err(err);
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let name = source.name();
            match self
                .retry
                .run_with_retry(name, move || source.fetch_token())
                .await
            {
                Ok(token) => {
                    info!("token source '{}' issued a new token", name);
                    self.observer.token_refreshed(name, token.exp_unix_ts, start.elapsed());
                    self.cache.set(token.clone()).await;
                    return Ok(token);
                }
                Err(e) => failures.push(format!("{}: {}", name, e)),
            }
        }

        let err = AuthError::Refresh { failures };
        self.observer.token_refresh_failed(&err, start.elapsed());
        Err(err)
    }
}
