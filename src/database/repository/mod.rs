//! Repository module - decentralized data access layer.

mod dump_channel_repository;
mod history_repository;
mod rate_limit_repository;
mod settings_repository;
mod template_repository;

pub use dump_channel_repository::DumpChannelRepository;
pub use history_repository::HistoryRepository;
pub use rate_limit_repository::RateLimitRepository;
pub use settings_repository::SettingsRepository;
pub use template_repository::{MAX_TEMPLATES_PER_USER, TemplateRepository};
