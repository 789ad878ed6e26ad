//! Service account source.
//!
//! Signs a short-lived RS256 assertion with the credential's private key and
//! exchanges it at the credential's `token_uri` (JWT-bearer grant).

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::token::Token;
use crate::config::credentials::ServiceAccountCredential;
use crate::error::ConfigError;
use crate::helpers::time::{expiry_from_ttl, now_u64};
use crate::sources::FetchToken;
use crate::utils::constants::{ASSERTION_LIFETIME_SECS, CLOUD_PLATFORM_SCOPE, JWT_BEARER_GRANT_TYPE};

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Clone)]
pub struct ServiceAccountSource {
    credential: Arc<ServiceAccountCredential>,
    encoding_key: Arc<EncodingKey>,
    client: Client,
}

impl fmt::Debug for ServiceAccountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountSource")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountSource {
    pub fn new(credential: ServiceAccountCredential, client: Client) -> Result<Self, ConfigError> {
        let encoding_key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        Ok(Self {
            credential: Arc::new(credential),
            encoding_key: Arc::new(encoding_key),
            client,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.credential.client_email
    }

    fn sign_assertion(&self, now: u64) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.credential.private_key_id.to_owned();

        let claims = AssertionClaims {
            iss: &self.credential.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.credential.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        encode(&header, &claims, &self.encoding_key).context("signing service account assertion")
    }
}

impl FetchToken for ServiceAccountSource {
    async fn fetch_token(&self) -> Result<Token> {
        let now = now_u64();
        let assertion = self.sign_assertion(now)?;

        let form = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())];
        let response = self
            .client
            .post(&self.credential.token_uri)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("token request failed: {} {}", status, body));
        }

        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("malformed token response: {}", e))?;
        if parsed.access_token.is_empty() {
            return Err(anyhow!("malformed token response: empty access_token"));
        }

        let exp_unix_ts = parsed.expires_in.map(|ttl| expiry_from_ttl(now, ttl));
        debug!(
            client_email = %self.credential.client_email,
            exp_unix_ts = ?exp_unix_ts,
            "service account token issued"
        );
        Ok(Token::new(parsed.access_token, exp_unix_ts))
    }
}
