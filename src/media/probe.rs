//! ffprobe report parsing.

use std::collections::HashMap;

use serde::Deserialize;

/// Raw `ffprobe -print_format json -show_format -show_streams` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// The facts about a file that naming and thumbnailing care about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
    pub audio_bitrate_kbps: Option<u64>,
}

impl MediaInfo {
    pub fn from_probe(probe: &ProbeOutput) -> Self {
        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video") && !is_cover_art(s));
        let audio = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));

        let empty = HashMap::new();
        let format_tags = probe.format.as_ref().map(|f| &f.tags).unwrap_or(&empty);
        let tag = |keys: &[&str]| -> Option<String> {
            // Container tags first, then stream tags (Ogg/Opus keep them there).
            let sources = std::iter::once(format_tags)
                .chain(audio.map(|s| &s.tags))
                .chain(video.map(|s| &s.tags));
            for tags in sources {
                for key in keys {
                    if let Some(value) = lookup_tag(tags, key) {
                        return Some(value);
                    }
                }
            }
            None
        };

        let duration_secs = probe
            .format
            .as_ref()
            .and_then(|f| parse_f64(f.duration.as_deref()))
            .or_else(|| video.and_then(|s| parse_f64(s.duration.as_deref())))
            .or_else(|| audio.and_then(|s| parse_f64(s.duration.as_deref())));

        let audio_bitrate_kbps = audio
            .and_then(|s| parse_f64(s.bit_rate.as_deref()))
            .or_else(|| {
                // Audio-only containers often report the bitrate on the format.
                if video.is_none() {
                    probe.format.as_ref().and_then(|f| parse_f64(f.bit_rate.as_deref()))
                } else {
                    None
                }
            })
            .map(|bps| (bps / 1000.0).round() as u64)
            .filter(|kbps| *kbps > 0);

        Self {
            title: tag(&["title"]),
            artist: tag(&["artist", "album_artist", "performer"]),
            author: tag(&["author", "composer"]),
            album: tag(&["album"]),
            genre: tag(&["genre"]),
            year: tag(&["date", "year"]).and_then(|d| extract_year(&d)),
            video_codec: video.and_then(|s| s.codec_name.clone()),
            audio_codec: audio.and_then(|s| s.codec_name.clone()),
            width: video.and_then(|s| s.width),
            height: video.and_then(|s| s.height),
            duration_secs,
            audio_bitrate_kbps,
        }
    }

    pub fn has_video(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    /// Common resolution label from the frame height, e.g. `1080p`.
    pub fn resolution_label(&self) -> Option<String> {
        let (w, h) = (self.width?, self.height?);
        // Use the shorter side so portrait videos get the expected label.
        let short = w.min(h);
        let label = match short {
            0 => return None,
            s if s >= 2000 => "2160p".to_string(),
            s if s >= 1300 => "1440p".to_string(),
            s if s >= 1000 => "1080p".to_string(),
            s if s >= 700 => "720p".to_string(),
            s if s >= 560 => "576p".to_string(),
            s if s >= 470 => "480p".to_string(),
            s => format!("{}p", s),
        };
        Some(label)
    }
}

/// Embedded album covers show up as single-frame video streams.
fn is_cover_art(stream: &ProbeStream) -> bool {
    matches!(stream.codec_name.as_deref(), Some("mjpeg" | "png" | "bmp"))
        && stream.duration.is_none()
}

fn lookup_tag(tags: &HashMap<String, String>, key: &str) -> Option<String> {
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_f64(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

fn extract_year(date: &str) -> Option<String> {
    let year: String = date.chars().take(4).collect();
    (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then_some(year)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "duration": "125.4"},
            {"codec_type": "audio", "codec_name": "aac", "bit_rate": "128000", "tags": {"language": "eng"}}
        ],
        "format": {"duration": "125.400000", "bit_rate": "4000000", "tags": {"TITLE": "Trip", "date": "2021-06-01"}}
    }"#;

    const AUDIO_JSON: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "mp3"},
            {"codec_type": "video", "codec_name": "mjpeg", "width": 500, "height": 500}
        ],
        "format": {"duration": "200.0", "bit_rate": "320000",
                   "tags": {"title": "Song", "artist": "Artist", "album": "LP", "genre": "Rock"}}
    }"#;

    #[test]
    fn test_video_probe() {
        let probe: ProbeOutput = serde_json::from_str(VIDEO_JSON).unwrap();
        let info = MediaInfo::from_probe(&probe);

        assert_eq!(info.title.as_deref(), Some("Trip"));
        assert_eq!(info.year.as_deref(), Some("2021"));
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.audio_bitrate_kbps, Some(128));
        assert_eq!(info.resolution_label().as_deref(), Some("1080p"));
        assert_eq!(info.duration_secs, Some(125.4));
    }

    #[test]
    fn test_audio_probe_ignores_cover_art() {
        let probe: ProbeOutput = serde_json::from_str(AUDIO_JSON).unwrap();
        let info = MediaInfo::from_probe(&probe);

        assert!(!info.has_video());
        assert_eq!(info.artist.as_deref(), Some("Artist"));
        assert_eq!(info.album.as_deref(), Some("LP"));
        assert_eq!(info.audio_bitrate_kbps, Some(320));
        assert_eq!(info.audio_codec.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_empty_probe() {
        let probe: ProbeOutput = serde_json::from_str("{}").unwrap();
        assert_eq!(MediaInfo::from_probe(&probe), MediaInfo::default());
    }

    #[test]
    fn test_portrait_resolution() {
        let info = MediaInfo {
            width: Some(720),
            height: Some(1280),
            ..Default::default()
        };
        assert_eq!(info.resolution_label().as_deref(), Some("720p"));
    }
}
