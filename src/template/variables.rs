//! Variable values available to a template.

use std::collections::HashMap;

const RESOLUTIONS: [&str; 6] = ["480p", "576p", "720p", "1080p", "1440p", "2160p"];

const QUALITY_TAGS: [&str; 12] = [
    "BluRay", "BDRip", "BRRip", "WEB-DL", "WEBRip", "HDTV", "DVDRip", "HDRip", "REMUX", "HDR",
    "HEVC", "CAM",
];

/// Name to value mapping consumed by [`super::render`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<&'static str, String>,
}

impl Variables {
    /// Set a value. Blank values are ignored so they render as absent.
    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if !value.is_empty() {
            self.values.insert(name, value.to_string());
        }
    }

    /// Set a value when one is known.
    pub fn set_opt<S: Into<String>>(&mut self, name: &'static str, value: Option<S>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    /// Set a value only when no earlier source provided one.
    pub fn set_default(&mut self, name: &'static str, value: impl Into<String>) {
        if !self.values.contains_key(name) {
            self.set(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Fill gaps from another set of variables.
    pub fn merge_defaults(&mut self, other: Variables) {
        for (name, value) in other.values {
            self.values.entry(name).or_insert(value);
        }
    }

    /// Extract what can be guessed from a release-style file stem such as
    /// `Show.Name.S01E02.1080p.WEB-DL`.
    pub fn from_filename(stem: &str) -> Self {
        let mut vars = Self::default();

        let tokens: Vec<&str> = stem
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .map(|t| t.trim_matches('-'))
            .filter(|t| !t.is_empty())
            .collect();

        if let Some(year) = tokens.iter().rev().find(|t| is_year(t)) {
            vars.set("year", *year);
        }

        for token in &tokens {
            if let Some((season, episode)) = parse_episode_tag(token) {
                vars.set("season", format!("{:02}", season));
                vars.set("episode", format!("{:02}", episode));
                break;
            }
        }

        for token in &tokens {
            let lower = token.to_ascii_lowercase();
            if lower == "4k" || lower == "uhd" {
                vars.set("resolution", "2160p");
                break;
            }
            if RESOLUTIONS.contains(&lower.as_str()) {
                vars.set("resolution", lower);
                break;
            }
        }

        if let Some(tag) = tokens.iter().find_map(|t| {
            QUALITY_TAGS
                .iter()
                .find(|q| q.eq_ignore_ascii_case(t))
                .copied()
        }) {
            vars.set("quality", tag);
        }

        vars
    }
}

fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && (token.starts_with("19") || token.starts_with("20"))
}

/// Parse `S01E02` (any case) into season and episode numbers.
fn parse_episode_tag(token: &str) -> Option<(u32, u32)> {
    let upper = token.to_ascii_uppercase();
    let rest = upper.strip_prefix('S')?;
    let (season, episode) = rest.split_once('E')?;
    if season.is_empty() || episode.is_empty() || season.len() > 2 || episode.len() > 3 {
        return None;
    }
    Some((season.parse().ok()?, episode.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_are_absent() {
        let mut vars = Variables::default();
        vars.set("title", "   ");
        assert_eq!(vars.get("title"), None);
    }

    #[test]
    fn test_set_default_keeps_first() {
        let mut vars = Variables::default();
        vars.set("title", "Probe");
        vars.set_default("title", "Stem");
        vars.set_default("artist", "Someone");
        assert_eq!(vars.get("title"), Some("Probe"));
        assert_eq!(vars.get("artist"), Some("Someone"));
    }

    #[test]
    fn test_from_filename_release_name() {
        let vars = Variables::from_filename("Show.Name.2019.S01E02.1080p.WEB-DL.x264");
        assert_eq!(vars.get("year"), Some("2019"));
        assert_eq!(vars.get("season"), Some("01"));
        assert_eq!(vars.get("episode"), Some("02"));
        assert_eq!(vars.get("resolution"), Some("1080p"));
        assert_eq!(vars.get("quality"), Some("WEB-DL"));
    }

    #[test]
    fn test_from_filename_plain() {
        let vars = Variables::from_filename("holiday video");
        assert_eq!(vars, Variables::default());
    }

    #[test]
    fn test_from_filename_4k_bluray() {
        let vars = Variables::from_filename("Film (1999) 4K bluray");
        assert_eq!(vars.get("year"), Some("1999"));
        assert_eq!(vars.get("resolution"), Some("2160p"));
        assert_eq!(vars.get("quality"), Some("BluRay"));
    }
}
