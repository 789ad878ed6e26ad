use chrono::Utc;
use tokio::time::Instant;

pub fn now_u64() -> u64 {
    now_i64().max(0) as u64
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// Absolute expiry from a relative `expires_in`
pub fn expiry_from_ttl(now: u64, ttl_seconds: u64) -> u64 {
    now.saturating_add(ttl_seconds)
}
