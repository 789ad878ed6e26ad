use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::cache::token::Token;

/// Single-slot token cache shared by every session of the process.
///
/// The slot is replaced as a whole, so readers always observe a value and
/// expiry that were issued together. `refresh_gate` serializes the
/// check-then-refresh sequence of the provider.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: RwLock<Option<Token>>,
    refresh_gate: Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached token
    pub async fn set(&self, token: Token) {
        *self.slot.write().await = Some(token);
    }

    /// Current token, whatever its expiry
    pub async fn get(&self) -> Option<Token> {
        self.slot.read().await.clone()
    }

    /// Token whose expiry is strictly after `now`
    pub async fn get_fresh(&self, now: u64) -> Option<Token> {
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_fresh_at(now))
            .cloned()
    }

    pub async fn is_valid_at(&self, now: u64, safety_margin_seconds: u64) -> bool {
        self.slot
            .read()
            .await
            .as_ref()
            .is_some_and(|token| token.is_valid_at(now, safety_margin_seconds))
    }

    /// Held for the whole refresh so concurrent callers queue behind it
    pub async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.lock().await
    }
}
