//! Per-user rename preferences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an uploaded file gets its new name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameMode {
    /// Render the active format template.
    #[default]
    Auto,
    /// Ask the user for a name per file.
    Manual,
}

impl RenameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for RenameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown rename mode {other:?}")),
        }
    }
}

impl fmt::Display for RenameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "Auto",
            Self::Manual => "Manual",
        })
    }
}

/// How processed files are sent back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Document,
    Video,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media type {other:?}")),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "Document",
            Self::Video => "Video",
        })
    }
}

/// Container tags a user wants written into their files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Title of audio streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Title of subtitle streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Title of video streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

/// Editable metadata fields, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Title,
    Author,
    Artist,
    Audio,
    Subtitle,
    Video,
}

impl MetadataField {
    pub const ALL: [MetadataField; 6] = [
        Self::Title,
        Self::Author,
        Self::Artist,
        Self::Audio,
        Self::Subtitle,
        Self::Video,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Artist => "artist",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Video => "video",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Author => "Author",
            Self::Artist => "Artist",
            Self::Audio => "Audio",
            Self::Subtitle => "Subtitle",
            Self::Video => "Video",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.key() == raw)
    }
}

impl MetadataTags {
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        let value = match field {
            MetadataField::Title => &self.title,
            MetadataField::Author => &self.author,
            MetadataField::Artist => &self.artist,
            MetadataField::Audio => &self.audio,
            MetadataField::Subtitle => &self.subtitle,
            MetadataField::Video => &self.video,
        };
        value.as_deref()
    }

    /// Set or clear (with `None` or a blank value) one field.
    pub fn set(&mut self, field: MetadataField, value: Option<String>) {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let slot = match field {
            MetadataField::Title => &mut self.title,
            MetadataField::Author => &mut self.author,
            MetadataField::Artist => &mut self.artist,
            MetadataField::Audio => &mut self.audio,
            MetadataField::Subtitle => &mut self.subtitle,
            MetadataField::Video => &mut self.video,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        MetadataField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// A user's settings row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: u64,
    pub rename_mode: RenameMode,
    pub media_type: MediaType,
    pub format_template: String,
    pub auto_thumbnail: bool,
    /// Telegram file ID of the custom thumbnail.
    pub thumbnail_file_id: Option<String>,
    pub metadata_enabled: bool,
    pub metadata: MetadataTags,
}

impl UserSettings {
    /// Defaults for a new user.
    pub fn new(user_id: u64, default_format: &str) -> Self {
        Self {
            user_id,
            rename_mode: RenameMode::Auto,
            media_type: MediaType::Document,
            format_template: default_format.to_string(),
            auto_thumbnail: true,
            thumbnail_file_id: None,
            metadata_enabled: false,
            metadata: MetadataTags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip_strings() {
        assert_eq!("manual".parse::<RenameMode>().unwrap(), RenameMode::Manual);
        assert_eq!(RenameMode::Auto.as_str(), "auto");
        assert!("other".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_metadata_set_and_clear() {
        let mut tags = MetadataTags::default();
        assert!(tags.is_empty());

        tags.set(MetadataField::Title, Some(" My Title ".into()));
        assert_eq!(tags.get(MetadataField::Title), Some("My Title"));

        tags.set(MetadataField::Title, Some("   ".into()));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_metadata_json_skips_empty() {
        let mut tags = MetadataTags::default();
        tags.set(MetadataField::Artist, Some("Someone".into()));
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"artist":"Someone"}"#);
    }

    #[test]
    fn test_field_parse() {
        assert_eq!(MetadataField::parse("Subtitle"), Some(MetadataField::Subtitle));
        assert_eq!(MetadataField::parse("lyrics"), None);
    }
}
