//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod format;
pub mod parser;
pub mod reply;
pub mod text;

pub use format::{format_duration, format_file_size, format_timestamp};
pub use parser::{parse_channel_id, parse_user_id, split_first_word};
pub use reply::{reply_html, reply_menu, show_menu};
pub use text::{html_escape, sanitize_filename, split_extension, truncate_text, validate_filename};

/// Format a user for display.
///
/// If the user has a username, returns @username.
/// Otherwise, returns the first name.
pub fn format_username(username: Option<&str>, first_name: &str) -> String {
    match username {
        Some(u) => format!("@{}", u),
        None => first_name.to_string(),
    }
}
