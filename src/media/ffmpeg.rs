//! Thin async wrapper over the `ffmpeg` and `ffprobe` binaries.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::pipeline::PipelineError;
use super::probe::ProbeOutput;
use crate::utils::truncate_text;

/// Locations of the external tools.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: String,
    ffprobe: String,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Run ffprobe and parse its JSON report.
    pub async fn probe(&self, input: &Path) -> Result<ProbeOutput, PipelineError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::Ffmpeg(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::Ffmpeg(format!("unreadable ffprobe output: {e}")))
    }

    /// Run ffmpeg with `args`, failing with the tail of stderr.
    pub async fn run(&self, args: &[String]) -> Result<(), PipelineError> {
        debug!("ffmpeg {}", args.join(" "));

        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        Err(PipelineError::Ffmpeg(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            truncate_text(&tail, 300)
        )))
    }
}
