//! Database models.

pub mod dump_channel;
pub mod format_template;
pub mod history;
pub mod rate_limit;
pub mod settings;
pub mod user;

pub use dump_channel::DumpChannel;
pub use format_template::FormatTemplate;
pub use history::{BotStats, FileRecord, LeaderboardEntry, UserStats};
pub use rate_limit::{Admission, RateWindow};
pub use settings::{MediaType, MetadataField, MetadataTags, RenameMode, UserSettings};
pub use user::{Role, UserProfile, UserRecord};
