//! Thumbnail extraction from video frames.

use std::path::Path;

/// Preferred capture point, in seconds.
const PREFERRED_OFFSET: f64 = 30.0;

/// Pick a frame time: 30 s in, or the middle of shorter clips.
pub fn frame_offset(duration_secs: Option<f64>) -> f64 {
    match duration_secs {
        Some(d) if d > 0.0 => (d / 2.0).min(PREFERRED_OFFSET),
        _ => 0.0,
    }
}

/// ffmpeg arguments grabbing one frame as a Telegram-sized JPEG.
pub fn frame_args(input: &Path, output: &Path, offset: f64) -> Vec<String> {
    vec![
        "-y".into(),
        "-ss".into(),
        format!("{offset:.2}"),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vframes".into(),
        "1".into(),
        // Telegram rejects thumbnails wider than 320 px.
        "-vf".into(),
        "scale=320:-2".into(),
        "-q:v".into(),
        "2".into(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_offset() {
        assert_eq!(frame_offset(Some(600.0)), 30.0);
        assert_eq!(frame_offset(Some(10.0)), 5.0);
        assert_eq!(frame_offset(None), 0.0);
    }

    #[test]
    fn test_frame_args() {
        let args = frame_args(Path::new("v.mp4"), Path::new("t.jpg"), 5.0);
        assert_eq!(args[2], "5.00");
        assert_eq!(args.last().map(String::as_str), Some("t.jpg"));
    }
}
