//! Text helpers: HTML escaping and filename hygiene.

/// Characters Telegram clients and common filesystems refuse in names.
const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const MAX_STEM_CHARS: usize = 200;
const MAX_NAME_CHARS: usize = 255;

/// Escape text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Split `name` into stem and extension (without the dot).
///
/// Leading dots do not start an extension, and an extension longer than
/// ten characters or containing spaces is treated as part of the stem.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => {
            let ext = &name[idx + 1..];
            if ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                (&name[..idx], Some(ext))
            } else {
                (name, None)
            }
        }
        _ => (name, None),
    }
}

/// Make `name` safe to use as an upload file name.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == ' ' || c == '.');

    if trimmed.is_empty() {
        return "unnamed_file".to_string();
    }

    let (stem, ext) = split_extension(trimmed);
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    let stem = stem.trim_end_matches([' ', '.']);
    let stem = if stem.is_empty() { "unnamed_file" } else { stem };

    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

/// Validate a user-supplied file name, returning the reason on rejection.
pub fn validate_filename(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("File name cannot be empty.");
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err("File name is too long (max 255 characters).");
    }
    if name.chars().any(|c| INVALID_CHARS.contains(&c) || c.is_control()) {
        return Err("File name contains invalid characters: < > : \" / \\ | ? *");
    }
    if name.starts_with('.') {
        return Err("File name cannot start with a dot.");
    }
    Ok(())
}

/// Truncate to `max` characters, appending an ellipsis when cut.
pub fn truncate_text(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
