//! Expiry policies for the bot's caches.

use std::time::Duration;

/// Capacity and expiry of one cache.
///
/// Repositories pick one of the named presets below; the builders exist for
/// the odd cache that needs something in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_capacity: u64,
    /// Hard lifetime counted from insertion.
    pub ttl: Option<Duration>,
    /// Lifetime counted from the last read or write.
    pub tti: Option<Duration>,
}

impl CacheConfig {
    pub const fn new(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ttl: None,
            tti: None,
        }
    }

    #[must_use]
    pub const fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    #[must_use]
    pub const fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Role and ban flag per user. Short, since /ban must bite quickly on
    /// other instances sharing the database.
    pub const fn access() -> Self {
        Self::new(10_000).ttl(Duration::from_secs(300))
    }

    /// Per-user rename settings. Written through on every change.
    pub const fn user_settings() -> Self {
        Self::new(10_000)
            .ttl(Duration::from_secs(1800))
            .tti(Duration::from_secs(600))
    }

    /// Debounces the "last seen" profile upsert done on every update.
    pub const fn seen_users() -> Self {
        Self::new(10_000).ttl(Duration::from_secs(60))
    }

    /// The single list of active dump channels.
    pub const fn dump_channels() -> Self {
        Self::new(1).ttl(Duration::from_secs(600))
    }

    /// Conversation state: dropped once the user has been quiet for `idle`.
    pub const fn session(idle: Duration) -> Self {
        Self::new(20_000).tti(idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expires_on_idle_only() {
        let session = CacheConfig::session(Duration::from_secs(600));
        assert_eq!(session.ttl, None);
        assert_eq!(session.tti, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_presets() {
        assert_eq!(CacheConfig::dump_channels().max_capacity, 1);
        assert!(CacheConfig::user_settings().tti.is_some());
        assert_eq!(
            CacheConfig::new(5).ttl(Duration::from_secs(9)),
            CacheConfig {
                max_capacity: 5,
                ttl: Some(Duration::from_secs(9)),
                tti: None,
            }
        );
    }
}
