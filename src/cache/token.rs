/// Bearer token as issued by a source.
///
/// `value` and `exp_unix_ts` are always written together; a token without
/// a known expiry is never considered fresh.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub exp_unix_ts: Option<u64>, // UNIX TIMESTAMP
}

impl Token {
    pub fn new(value: String, exp_unix_ts: Option<u64>) -> Self {
        Self { value, exp_unix_ts }
    }

    /// Expiry strictly in the future relative to `now`.
    pub fn is_fresh_at(&self, now: u64) -> bool {
        self.exp_unix_ts.is_some_and(|exp| now < exp)
    }

    /// Expiry minus `safety_margin_seconds` still in the future relative to `now`.
    pub fn is_valid_at(&self, now: u64, safety_margin_seconds: u64) -> bool {
        self.exp_unix_ts
            .is_some_and(|exp| now < exp.saturating_sub(safety_margin_seconds))
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("exp_unix_ts", &self.exp_unix_ts)
            .finish()
    }
}
