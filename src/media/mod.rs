//! Media handling: probing, naming, metadata, thumbnails and the
//! end-to-end rename pipeline.

pub mod cleanup;
mod ffmpeg;
mod metadata;
pub mod naming;
mod pipeline;
mod probe;
mod thumbnail;

use teloxide::types::Message;

pub use pipeline::{FilePipeline, NameStrategy, PipelineError, RenameJob, StatusMessage};

/// What Telegram told us a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Document,
    Video,
    Audio,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// An uploaded file waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    /// Telegram file id, as used by `get_file`.
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: u64,
    pub kind: FileKind,
    /// Attributes Telegram already knows; used when probing fails.
    pub duration_secs: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub performer: Option<String>,
    pub title: Option<String>,
}

impl IncomingFile {
    /// Extract the renamable file from a message, if it carries one.
    pub fn from_message(msg: &Message) -> Option<Self> {
        if let Some(doc) = msg.document() {
            return Some(Self {
                file_id: doc.file.id.clone(),
                file_name: doc.file_name.clone(),
                mime_type: doc.mime_type.as_ref().map(|m| m.to_string()),
                size: u64::from(doc.file.size),
                kind: FileKind::Document,
                duration_secs: None,
                width: None,
                height: None,
                performer: None,
                title: None,
            });
        }

        if let Some(video) = msg.video() {
            return Some(Self {
                file_id: video.file.id.clone(),
                file_name: video.file_name.clone(),
                mime_type: video.mime_type.as_ref().map(|m| m.to_string()),
                size: u64::from(video.file.size),
                kind: FileKind::Video,
                duration_secs: Some(video.duration.seconds()),
                width: Some(video.width),
                height: Some(video.height),
                performer: None,
                title: None,
            });
        }

        if let Some(audio) = msg.audio() {
            return Some(Self {
                file_id: audio.file.id.clone(),
                file_name: audio.file_name.clone(),
                mime_type: audio.mime_type.as_ref().map(|m| m.to_string()),
                size: u64::from(audio.file.size),
                kind: FileKind::Audio,
                duration_secs: Some(audio.duration.seconds()),
                width: None,
                height: None,
                performer: audio.performer.clone(),
                title: audio.title.clone(),
            });
        }

        None
    }

    /// Original name, or a generic one derived from the kind.
    pub fn original_name(&self) -> String {
        match &self.file_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => {
                let ext = match self.kind {
                    FileKind::Video => "mp4",
                    FileKind::Audio => "mp3",
                    FileKind::Document => "bin",
                };
                format!("{}_file.{}", self.kind.as_str(), ext)
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_file(name: &str, kind: FileKind, size: u64) -> IncomingFile {
    IncomingFile {
        file_id: "BQACAgIAAxkBAAI".to_string(),
        file_name: Some(name.to_string()),
        mime_type: None,
        size,
        kind,
        duration_secs: None,
        width: None,
        height: None,
        performer: None,
        title: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(extra: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": 42, "type": "private", "first_name": "Ann" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ann" }
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_document_message_becomes_incoming_file() {
        let msg = message(serde_json::json!({
            "document": {
                "file_id": "BQACAgIAAxkBAAI",
                "file_unique_id": "AgAD",
                "file_size": 2048,
                "file_name": "Movie.2023.1080p.mkv",
                "mime_type": "video/x-matroska"
            }
        }));

        let file = IncomingFile::from_message(&msg).unwrap();
        assert_eq!(file.file_id, "BQACAgIAAxkBAAI");
        assert_eq!(file.kind, FileKind::Document);
        assert_eq!(file.size, 2048);
        assert_eq!(file.original_name(), "Movie.2023.1080p.mkv");
    }

    #[test]
    fn test_text_message_is_not_a_file() {
        let msg = message(serde_json::json!({ "text": "hello" }));
        assert!(IncomingFile::from_message(&msg).is_none());
    }

    #[test]
    fn test_generic_name_when_telegram_sends_none() {
        let mut file = sample_file("x", FileKind::Audio, 1);
        file.file_name = None;
        assert_eq!(file.original_name(), "audio_file.mp3");
    }
}
