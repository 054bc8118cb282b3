//! Container metadata rewriting.

use std::path::Path;

use crate::database::MetadataTags;

/// Comment tag stamped on every rewritten file.
pub const COMMENT: &str = "Processed by Auto Rename Bot";

/// ffmpeg arguments that copy every stream of `input` into `output` and
/// apply `tags`. Unset tags are left as they were.
pub fn metadata_args(input: &Path, output: &Path, tags: &MetadataTags) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-map".into(),
        "0".into(),
        "-c".into(),
        "copy".into(),
    ];

    let mut push = |flag: &str, key: &str, value: Option<&str>| {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(format!("{key}={value}"));
        }
    };

    push("-metadata", "title", tags.title.as_deref());
    push("-metadata", "artist", tags.artist.as_deref());
    push("-metadata", "author", tags.author.as_deref());
    push("-metadata:s:v", "title", tags.video.as_deref());
    push("-metadata:s:a", "title", tags.audio.as_deref());
    push("-metadata:s:s", "title", tags.subtitle.as_deref());
    push("-metadata", "comment", Some(COMMENT));

    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MetadataField;

    #[test]
    fn test_only_set_tags_are_written() {
        let mut tags = MetadataTags::default();
        tags.set(MetadataField::Title, Some("My Film".into()));
        tags.set(MetadataField::Audio, Some("English".into()));

        let args = metadata_args(Path::new("in.mkv"), Path::new("out.mkv"), &tags);

        assert_eq!(&args[..7], ["-y", "-i", "in.mkv", "-map", "0", "-c", "copy"]);
        assert!(args.windows(2).any(|w| w == ["-metadata", "title=My Film"]));
        assert!(args.windows(2).any(|w| w == ["-metadata:s:a", "title=English"]));
        assert!(!args.iter().any(|a| a.starts_with("artist=")));
        assert!(!args.iter().any(|a| a == "-metadata:s:s"));
        assert_eq!(args.last().map(String::as_str), Some("out.mkv"));
    }
}
