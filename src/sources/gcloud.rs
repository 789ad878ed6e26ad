use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::cache::token::Token;
use crate::helpers::time::{expiry_from_ttl, now_u64};
use crate::sources::FetchToken;

/// Fallback source: asks the local cloud CLI for an access token.
#[derive(Debug, Clone)]
pub struct GcloudSource {
    pub command: String,
    pub assumed_lifetime_seconds: u64,
}

impl GcloudSource {
    pub fn new(command: String, assumed_lifetime_seconds: u64) -> Self {
        Self {
            command,
            assumed_lifetime_seconds,
        }
    }
}

impl FetchToken for GcloudSource {
    async fn fetch_token(&self) -> Result<Token> {
        let now = now_u64();
        let output = Command::new(&self.command)
            .args(["auth", "print-access-token"])
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("running '{}'", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            ));
        }

        let value = String::from_utf8(output.stdout)
            .context("access token is not valid UTF-8")?
            .trim()
            .to_owned();
        if value.is_empty() {
            return Err(anyhow!("'{}' printed an empty access token", self.command));
        }

        debug!("access token obtained from '{}'", self.command);
        Ok(Token::new(value, Some(expiry_from_ttl(now, self.assumed_lifetime_seconds))))
    }
}
