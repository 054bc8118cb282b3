//! Argument parsing for admin commands.

/// Parse a Telegram user ID argument.
pub fn parse_user_id(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

/// Parse a channel ID. Channel IDs are always negative (`-100…`).
pub fn parse_channel_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id < 0)
}

/// Split a command's argument string into its first word and the rest.
pub fn split_first_word(args: &str) -> (&str, &str) {
    let args = args.trim();
    match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (args, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(" 12345 "), Some(12345));
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("-5"), None);
        assert_eq!(parse_user_id("abc"), None);
    }

    #[test]
    fn test_parse_channel_id() {
        assert_eq!(parse_channel_id("-1001234567890"), Some(-1001234567890));
        assert_eq!(parse_channel_id("1001234567890"), None);
        assert_eq!(parse_channel_id("channel"), None);
    }

    #[test]
    fn test_split_first_word() {
        assert_eq!(split_first_word("add -100123"), ("add", "-100123"));
        assert_eq!(split_first_word("  list  "), ("list", ""));
        assert_eq!(split_first_word("movie {title}  ({year})"), ("movie", "{title}  ({year})"));
    }
}
