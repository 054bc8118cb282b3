//! In-memory caches in front of SQLite and for conversation state.
//!
//! Every cache is built from a [`CacheConfig`] preset named after the data
//! it holds:
//!
//! ```ignore
//! let cache = TypedCache::<u64, UserSettings>::new("user_settings", CacheConfig::user_settings());
//! ```

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
