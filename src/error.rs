/// Failures surfaced by marketplace lookups, extraction and snapshot storage.
///
/// Everything except `RateLimited` (after the retry budget is spent) and
/// `CorruptSnapshot` is reported to callers as a typed absence: the polling
/// loop logs it and moves on, the command layer renders `user_message`.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Rate limited after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    #[error("Order book contains no parsable prices")]
    EmptyOrderBook,

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    /// Text shown to chat users instead of the raw error.
    pub fn user_message(&self, item: &str) -> String {
        format!("could not retrieve data for `{}`", item)
    }

    /// Whether the error means "nothing there" rather than "something broke".
    pub fn is_absence(&self) -> bool {
        matches!(self, MarketError::NotFound(_) | MarketError::EmptyOrderBook)
    }
}

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        MarketError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for MarketError {
    fn from(err: rusqlite::Error) -> Self {
        MarketError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
