//! Format template engine.
//!
//! Templates are plain strings with `{variable}` placeholders, e.g.
//! `"{title} - {artist}"`. Rendering substitutes every recognized
//! placeholder with its value (or nothing when the value is unknown for a
//! given file) and leaves unrecognized placeholders untouched.

mod variables;

use thiserror::Error;

pub use variables::Variables;

/// Longest template a user may save.
pub const MAX_TEMPLATE_LEN: usize = 200;

/// Every variable a template may reference, with a short description.
pub const VARIABLES: &[(&str, &str)] = &[
    ("title", "Title tag, or the original name"),
    ("artist", "Artist / performer"),
    ("author", "Author (falls back to artist)"),
    ("album", "Album"),
    ("genre", "Genre"),
    ("year", "Release year"),
    ("audio", "Audio bitrate, e.g. 320kbps"),
    ("video", "Frame size, e.g. 1920x1080"),
    ("codec", "Video codec, or audio codec for audio files"),
    ("resolution", "Resolution label, e.g. 1080p"),
    ("duration", "Duration, e.g. 1:02:05"),
    ("size", "File size, e.g. 1.4 GB"),
    ("filename", "Original file name without extension"),
    ("ext", "Original extension"),
    ("season", "Season number from SxxEyy"),
    ("episode", "Episode number from SxxEyy"),
    ("quality", "Release quality, e.g. BluRay"),
];

/// Template validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,

    #[error("template is longer than {} characters", MAX_TEMPLATE_LEN)]
    TooLong,

    #[error("empty placeholder {{}}, put a variable name between the braces")]
    EmptyPlaceholder,

    #[error("unknown variables: {}", .0.join(", "))]
    UnknownVariables(Vec<String>),
}

/// A piece of a parsed template.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            out.push(Segment::Text(&rest[..open]));
        }
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                out.push(Segment::Placeholder(&after[..close]));
                rest = &after[close + 1..];
            }
            _ => {
                // Unmatched brace, keep it as text.
                out.push(Segment::Text(&rest[open..open + 1]));
                rest = after;
            }
        }
    }

    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Normalized variable name if `raw` names a known variable.
fn known(raw: &str) -> Option<&'static str> {
    let name = raw.trim().to_ascii_lowercase();
    VARIABLES.iter().map(|(n, _)| *n).find(|n| *n == name)
}

/// Render `template` with the given variables.
pub fn render(template: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(template.len() + 32);

    for segment in segments(template) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Placeholder(raw) => match known(raw) {
                Some(name) => out.push_str(vars.get(name).unwrap_or("")),
                None => {
                    out.push('{');
                    out.push_str(raw);
                    out.push('}');
                }
            },
        }
    }

    out
}

/// Distinct recognized variables in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in segments(template) {
        if let Segment::Placeholder(raw) = segment {
            if let Some(name) = known(raw) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

/// Check a template before it is stored.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    if template.trim().is_empty() {
        return Err(TemplateError::Empty);
    }
    if template.chars().count() > MAX_TEMPLATE_LEN {
        return Err(TemplateError::TooLong);
    }

    let mut unknown: Vec<String> = Vec::new();
    for segment in segments(template) {
        if let Segment::Placeholder(raw) = segment {
            if raw.trim().is_empty() {
                return Err(TemplateError::EmptyPlaceholder);
            }
            if known(raw).is_none() && !unknown.iter().any(|u| u == raw) {
                unknown.push(raw.to_string());
            }
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(TemplateError::UnknownVariables(unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> Variables {
        let mut v = Variables::default();
        for (k, val) in pairs {
            v.set(*k, *val);
        }
        v
    }

    #[test]
    fn test_render_basic() {
        let v = vars(&[("title", "Song"), ("artist", "Artist")]);
        assert_eq!(render("{title} - {artist}", &v), "Song - Artist");
    }

    #[test]
    fn test_render_absent_known_is_empty() {
        let v = vars(&[("title", "Song")]);
        assert_eq!(render("{title} [{year}]", &v), "Song []");
    }

    #[test]
    fn test_render_unknown_left_literal() {
        let v = vars(&[("title", "Song")]);
        assert_eq!(render("{title} {mood}", &v), "Song {mood}");
    }

    #[test]
    fn test_render_unmatched_braces() {
        let v = vars(&[("title", "Song")]);
        assert_eq!(render("{ {title} }", &v), "{ Song }");
        assert_eq!(render("{title", &v), "{title");
    }

    #[test]
    fn test_render_case_insensitive_names() {
        let v = vars(&[("title", "Song")]);
        assert_eq!(render("{Title}", &v), "Song");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{title} {year} {title} {nope}"),
            vec!["title".to_string(), "year".to_string()]
        );
    }

    #[test]
    fn test_validate() {
        assert!(validate("{title} - {artist}").is_ok());
        assert!(validate("plain name").is_ok());
        assert_eq!(validate("   "), Err(TemplateError::Empty));
        assert_eq!(validate(&"a".repeat(201)), Err(TemplateError::TooLong));
        assert_eq!(
            validate("{title} {mood} {mood}"),
            Err(TemplateError::UnknownVariables(vec!["mood".to_string()]))
        );
    }

    #[test]
    fn test_validate_rejects_empty_placeholder() {
        assert_eq!(validate("{title} {}"), Err(TemplateError::EmptyPlaceholder));
        assert_eq!(validate("{ } {mood}"), Err(TemplateError::EmptyPlaceholder));
        assert_eq!(
            TemplateError::EmptyPlaceholder.to_string(),
            "empty placeholder {}, put a variable name between the braces"
        );
    }
}
