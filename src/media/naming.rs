//! Output file naming.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

use super::probe::MediaInfo;
use super::{FileKind, IncomingFile};
use crate::database::MediaType;
use crate::template::{self, Variables};
use crate::utils::{format_duration, format_file_size, sanitize_filename, split_extension};

static VIDEO_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ts", "mpg", "mpeg"]
        .into_iter()
        .collect()
});

/// How the processed file is sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadAs {
    Document,
    Video,
    Audio,
}

pub fn is_video_name(name: &str) -> bool {
    split_extension(name)
        .1
        .map(|ext| VIDEO_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decide the upload method from the user's preference and the file.
pub fn upload_as(kind: FileKind, file_name: &str, preference: MediaType) -> UploadAs {
    match (preference, kind) {
        (MediaType::Document, _) => UploadAs::Document,
        (MediaType::Video, FileKind::Audio) => UploadAs::Audio,
        (MediaType::Video, FileKind::Video) => UploadAs::Video,
        (MediaType::Video, FileKind::Document) if is_video_name(file_name) => UploadAs::Video,
        (MediaType::Video, FileKind::Document) => UploadAs::Document,
    }
}

/// Gather template variables from the probe result, Telegram's own
/// attributes and the original file name, in that order of trust.
pub fn collect_variables(file: &IncomingFile, info: Option<&MediaInfo>) -> Variables {
    let original = file.original_name();
    let (stem, ext) = split_extension(&original);
    let mut vars = Variables::default();

    if let Some(info) = info {
        vars.set_opt("title", info.title.clone());
        vars.set_opt("artist", info.artist.clone());
        vars.set_opt("author", info.author.clone());
        vars.set_opt("album", info.album.clone());
        vars.set_opt("genre", info.genre.clone());
        vars.set_opt("year", info.year.clone());
        vars.set_opt("codec", info.video_codec.clone().or_else(|| info.audio_codec.clone()));
        vars.set_opt("audio", info.audio_bitrate_kbps.map(|k| format!("{k}kbps")));
        if let (Some(w), Some(h)) = (info.width, info.height) {
            vars.set("video", format!("{w}x{h}"));
        }
        vars.set_opt("resolution", info.resolution_label());
        vars.set_opt("duration", info.duration_secs.map(|d| format_duration(d.round() as i64)));
    }

    vars.set_default("title", file.title.clone().unwrap_or_default());
    vars.set_default("artist", file.performer.clone().unwrap_or_default());
    if let (Some(w), Some(h)) = (file.width, file.height) {
        vars.set_default("video", format!("{w}x{h}"));
        let dims = MediaInfo {
            width: Some(w),
            height: Some(h),
            ..Default::default()
        };
        vars.set_default("resolution", dims.resolution_label().unwrap_or_default());
    }
    if let Some(secs) = file.duration_secs.filter(|s| *s > 0) {
        vars.set_default("duration", format_duration(i64::from(secs)));
    }

    vars.merge_defaults(Variables::from_filename(stem));

    vars.set_default("title", stem);
    if let Some(artist) = vars.get("artist").map(str::to_string) {
        vars.set_default("author", artist);
    }
    vars.set("size", format_file_size(file.size));
    vars.set("filename", stem);
    vars.set_opt("ext", ext);

    vars
}

/// Render `template` into a safe file name carrying the original extension.
pub fn build_filename(template: &str, vars: &Variables, original: &str) -> String {
    let rendered = template::render(template, vars);
    finish_name(&rendered, original)
}

/// Clean a name typed by the user.
pub fn manual_filename(input: &str, original: &str) -> String {
    finish_name(input, original)
}

fn finish_name(candidate: &str, original: &str) -> String {
    let collapsed = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
    let (original_stem, ext) = split_extension(original);

    let base = if collapsed.trim_matches([' ', '.']).is_empty() {
        original_stem
    } else {
        collapsed.as_str()
    };

    let name = sanitize_filename(base);
    match ext {
        Some(ext) if !name.to_lowercase().ends_with(&format!(".{}", ext.to_lowercase())) => {
            format!("{name}.{ext}")
        }
        _ => name,
    }
}

/// A path in `dir` for `name` that does not exist yet (`name_1.ext`, …).
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_extension(name);
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem}_{n}.{ext}")),
            None => dir.join(format!("{stem}_{n}")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sample_file;

    #[test]
    fn test_build_from_probe() {
        let file = sample_file("track01.mp3", FileKind::Audio, 4_000_000);
        let info = MediaInfo {
            title: Some("Song".into()),
            artist: Some("Artist".into()),
            audio_bitrate_kbps: Some(320),
            ..Default::default()
        };
        let vars = collect_variables(&file, Some(&info));

        assert_eq!(build_filename("{title} - {artist}", &vars, "track01.mp3"), "Song - Artist.mp3");
        assert_eq!(build_filename("{author} [{audio}]", &vars, "track01.mp3"), "Artist [320kbps].mp3");
    }

    #[test]
    fn test_falls_back_to_filename_tokens() {
        let file = sample_file("Show.S02E05.720p.mkv", FileKind::Document, 10);
        let vars = collect_variables(&file, None);

        assert_eq!(
            build_filename("{title} S{season}E{episode} {resolution}", &vars, "Show.S02E05.720p.mkv"),
            "Show.S02E05.720p S02E05 720p.mkv"
        );
        assert_eq!(vars.get("ext"), Some("mkv"));
    }

    #[test]
    fn test_telegram_attributes() {
        let mut file = sample_file("clip.mp4", FileKind::Video, 10);
        file.width = Some(1280);
        file.height = Some(720);
        file.duration_secs = Some(75);
        let vars = collect_variables(&file, None);

        assert_eq!(vars.get("resolution"), Some("720p"));
        assert_eq!(vars.get("video"), Some("1280x720"));
        assert_eq!(vars.get("duration"), Some("1:15"));
    }

    #[test]
    fn test_empty_render_keeps_original_stem() {
        let vars = Variables::default();
        assert_eq!(build_filename("{artist}", &vars, "movie.mkv"), "movie.mkv");
    }

    #[test]
    fn test_extension_not_duplicated() {
        let vars = Variables::default();
        assert_eq!(manual_filename("Holiday.MKV", "raw.mkv"), "Holiday.MKV");
        assert_eq!(manual_filename("Holiday", "raw.mkv"), "Holiday.mkv");
        assert_eq!(build_filename("a/b", &vars, "x.mp4"), "a_b.mp4");
    }

    #[test]
    fn test_unique_destination() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_destination(dir.path(), "out.mkv");
        assert_eq!(first, dir.path().join("out.mkv"));

        std::fs::write(&first, b"x").unwrap();
        std::fs::write(dir.path().join("out_1.mkv"), b"x").unwrap();
        assert_eq!(unique_destination(dir.path(), "out.mkv"), dir.path().join("out_2.mkv"));
    }

    #[test]
    fn test_upload_as() {
        assert_eq!(upload_as(FileKind::Video, "a.mp4", MediaType::Document), UploadAs::Document);
        assert_eq!(upload_as(FileKind::Document, "a.mkv", MediaType::Video), UploadAs::Video);
        assert_eq!(upload_as(FileKind::Document, "a.pdf", MediaType::Video), UploadAs::Document);
        assert_eq!(upload_as(FileKind::Audio, "a.mp3", MediaType::Video), UploadAs::Audio);
    }
}
