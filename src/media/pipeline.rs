//! The rename pipeline: one uploaded file in, one renamed file out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use teloxide::RequestError;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId, ParseMode};
use thiserror::Error;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::cleanup::{JOB_DIR_PREFIX, SCRATCH_DIR_PREFIX};
use super::ffmpeg::Ffmpeg;
use super::metadata::metadata_args;
use super::naming::{self, UploadAs};
use super::probe::MediaInfo;
use super::thumbnail::{frame_args, frame_offset};
use super::{FileKind, IncomingFile};
use crate::bot::dispatcher::ThrottledBot;
use crate::config::Config;
use crate::database::{DumpChannelRepository, FileRecord, HistoryRepository, MetadataTags, UserSettings};
use crate::plugins::keyboards;
use crate::utils::{format_file_size, html_escape, split_extension};

/// Minimum time between two progress edits.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("telegram request failed: {0}")]
    Telegram(#[from] RequestError),

    #[error("download failed: {0}")]
    Download(String),

    #[error("{0}")]
    Ffmpeg(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    #[error("job cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Message shown to the user on the status message.
    pub fn user_message(&self) -> String {
        match self {
            Self::TooLarge { max, .. } => format!(
                "❌ File too large. Maximum size allowed: {}",
                format_file_size(*max)
            ),
            Self::Telegram(_) => {
                "❌ Telegram rejected the request. Please try again later.".to_string()
            }
            Self::Download(_) => "❌ Download failed. Please send the file again.".to_string(),
            Self::Ffmpeg(_) => "❌ The media file could not be processed.".to_string(),
            Self::Io(_) => "❌ The file could not be stored on the server.".to_string(),
            Self::Storage(_) => "❌ Internal database error.".to_string(),
            Self::Cancelled => "❌ The job was cancelled.".to_string(),
        }
    }
}

/// Reject files above the configured ceiling before touching them.
pub fn check_size(size: u64, max: u64) -> Result<(), PipelineError> {
    if size > max {
        return Err(PipelineError::TooLarge { size, max });
    }
    Ok(())
}

/// Where the new name comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameStrategy {
    /// Render the user's active template.
    Template,
    /// Use a name the user typed.
    Manual(String),
}

/// Everything needed to process one file.
#[derive(Debug, Clone)]
pub struct RenameJob {
    pub user_id: u64,
    pub chat_id: ChatId,
    pub file: IncomingFile,
    pub naming: NameStrategy,
    pub settings: UserSettings,
}

/// Summary of a finished job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub new_name: String,
    pub size: u64,
    pub elapsed: Duration,
    pub forwarded: usize,
}

/// The message a job reports its progress on.
#[derive(Clone)]
pub struct StatusMessage {
    bot: ThrottledBot,
    chat_id: ChatId,
    message_id: MessageId,
}

impl StatusMessage {
    pub fn new(bot: ThrottledBot, chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            bot,
            chat_id,
            message_id,
        }
    }

    /// Show an intermediate stage, keeping the cancel button.
    pub async fn update(&self, text: impl Into<String>) {
        let result = self
            .bot
            .edit_message_text(self.chat_id, self.message_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboards::job_cancel())
            .await;
        if let Err(e) = result {
            debug!("Status edit failed: {}", e);
        }
    }

    /// Show the final state, without buttons.
    pub async fn finish(&self, text: impl Into<String>) {
        let result = self
            .bot
            .edit_message_text(self.chat_id, self.message_id, text)
            .parse_mode(ParseMode::Html)
            .await;
        if let Err(e) = result {
            debug!("Status edit failed: {}", e);
        }
    }
}

/// Progress line with a ten-step bar.
pub fn progress_text(label: &str, done: u64, total: u64) -> String {
    if total == 0 {
        return format!("{label}…\n{}", format_file_size(done));
    }
    let percent = (done.min(total) * 100 / total) as usize;
    let filled = percent / 10;
    format!(
        "{label}… {percent}%\n[{}{}]\n{} / {}",
        "■".repeat(filled),
        "□".repeat(10 - filled),
        format_file_size(done),
        format_file_size(total)
    )
}

/// Runs rename jobs against Telegram and the local tools.
pub struct FilePipeline {
    bot: ThrottledBot,
    config: Arc<Config>,
    ffmpeg: Ffmpeg,
    history: Arc<HistoryRepository>,
    dumps: Arc<DumpChannelRepository>,
    permits: Arc<Semaphore>,
}

impl FilePipeline {
    pub fn new(
        bot: ThrottledBot,
        config: Arc<Config>,
        history: Arc<HistoryRepository>,
        dumps: Arc<DumpChannelRepository>,
    ) -> Self {
        let ffmpeg = Ffmpeg::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        Self {
            bot,
            config,
            ffmpeg,
            history,
            dumps,
            permits,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Process one file end to end.
    pub async fn run(&self, job: &RenameJob, status: &StatusMessage) -> Result<JobOutcome, PipelineError> {
        check_size(job.file.size, self.config.max_file_size)?;

        let _permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                status.update("⏳ Queued, waiting for a free worker…").await;
                Arc::clone(&self.permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::Cancelled)?
            }
        };

        let started = Instant::now();
        let original = job.file.original_name();
        let ext = split_extension(&original).1.map(str::to_string);

        // Removed on drop, including on cancellation.
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{JOB_DIR_PREFIX}{}_", job.user_id))
            .tempdir_in(&self.config.download_path)?;

        let source = workdir.path().join(match &ext {
            Some(ext) => format!("source.{ext}"),
            None => "source".to_string(),
        });

        self.download(&job.file.file_id, &source, job.file.size, Some(status))
            .await?;

        status.update("🔍 Reading media info…").await;
        let info = match self.ffmpeg.probe(&source).await {
            Ok(probe) => Some(MediaInfo::from_probe(&probe)),
            Err(e) => {
                warn!("Probe failed for user {}: {}", job.user_id, e);
                None
            }
        };

        let new_name = match &job.naming {
            NameStrategy::Template => {
                let vars = naming::collect_variables(&job.file, info.as_ref());
                naming::build_filename(&job.settings.format_template, &vars, &original)
            }
            NameStrategy::Manual(name) => naming::manual_filename(name, &original),
        };

        let dest = naming::unique_destination(workdir.path(), &new_name);
        tokio::fs::rename(&source, &dest).await?;

        if job.settings.metadata_enabled && !job.settings.metadata.is_empty() {
            status.update("✏️ Writing metadata…").await;
            self.apply_metadata(&dest, &job.settings.metadata, workdir.path(), ext.as_deref())
                .await;
        }

        let thumbnail = self.prepare_thumbnail(job, info.as_ref(), &dest).await;

        status
            .update(format!("📤 Uploading <code>{}</code>…", html_escape(&new_name)))
            .await;
        let thumb_path = thumbnail.as_ref().map(|(_, path)| path.as_path());
        let sent = self
            .upload(job, &dest, &new_name, thumb_path, info.as_ref())
            .await?;

        let forwarded = self.forward_to_dumps(job, sent.id).await;

        let elapsed = started.elapsed();
        let record = FileRecord {
            user_id: job.user_id,
            original_name: original.clone(),
            new_name: new_name.clone(),
            file_size: job.file.size,
            file_type: job.file.kind.as_str().to_string(),
            processing_ms: elapsed.as_millis() as u64,
        };
        if let Err(e) = self.history.record(&record).await {
            warn!("Failed to record history for user {}: {:#}", job.user_id, e);
        }

        info!(
            "User {} renamed {:?} -> {:?} ({}, {:.1}s)",
            job.user_id,
            original,
            new_name,
            format_file_size(job.file.size),
            elapsed.as_secs_f32()
        );

        Ok(JobOutcome {
            new_name,
            size: job.file.size,
            elapsed,
            forwarded,
        })
    }

    /// Stream a Telegram file to `dest`, reporting progress when asked.
    async fn download(
        &self,
        file_id: &str,
        dest: &Path,
        expected: u64,
        status: Option<&StatusMessage>,
    ) -> Result<(), PipelineError> {
        let file = self.bot.get_file(file_id).await?;
        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = self.bot.inner().download_file_stream(&file.path);

        let mut done: u64 = 0;
        let mut last_report: Option<Instant> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::Download(e.to_string()))?;
            out.write_all(&chunk).await?;
            done += chunk.len() as u64;

            if let Some(status) = status {
                if last_report.is_none_or(|t| t.elapsed() >= PROGRESS_INTERVAL) {
                    last_report = Some(Instant::now());
                    status.update(progress_text("📥 Downloading", done, expected)).await;
                }
            }
        }

        out.flush().await?;
        debug!("Downloaded {} bytes to {}", done, dest.display());
        Ok(())
    }

    /// Rewrite tags in place. Failures keep the untouched file.
    async fn apply_metadata(&self, dest: &Path, tags: &MetadataTags, dir: &Path, ext: Option<&str>) {
        let tmp = dir.join(match ext {
            Some(ext) => format!("metadata_out.{ext}"),
            None => "metadata_out".to_string(),
        });

        match self.ffmpeg.run(&metadata_args(dest, &tmp, tags)).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::rename(&tmp, dest).await {
                    warn!("Could not replace file after metadata rewrite: {}", e);
                }
            }
            Err(e) => warn!("Metadata rewrite failed, sending original: {}", e),
        }
    }

    /// Custom thumbnail first, then a frame grab for videos. The image lives
    /// in a scratch directory under `TEMP_PATH` that goes away with the
    /// returned handle.
    async fn prepare_thumbnail(
        &self,
        job: &RenameJob,
        info: Option<&MediaInfo>,
        media: &Path,
    ) -> Option<(TempDir, PathBuf)> {
        let is_video = job.file.kind == FileKind::Video
            || info.is_some_and(MediaInfo::has_video)
            || naming::is_video_name(&job.file.original_name());
        let wants_frame = job.settings.auto_thumbnail && is_video;
        if job.settings.thumbnail_file_id.is_none() && !wants_frame {
            return None;
        }

        let scratch = match tempfile::Builder::new()
            .prefix(&format!("{SCRATCH_DIR_PREFIX}{}_", job.user_id))
            .tempdir_in(&self.config.temp_path)
        {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Could not create thumbnail directory: {}", e);
                return None;
            }
        };
        let target = scratch.path().join("thumb.jpg");

        if let Some(file_id) = &job.settings.thumbnail_file_id {
            match self.download(file_id, &target, 0, None).await {
                Ok(()) => return Some((scratch, target)),
                Err(e) => warn!("Custom thumbnail unavailable for user {}: {}", job.user_id, e),
            }
        }

        if !wants_frame {
            return None;
        }

        let duration = info
            .and_then(|i| i.duration_secs)
            .or(job.file.duration_secs.map(f64::from));
        let args = frame_args(media, &target, frame_offset(duration));

        match self.ffmpeg.run(&args).await {
            Ok(()) if target.exists() => Some((scratch, target)),
            Ok(()) => None,
            Err(e) => {
                warn!("Thumbnail extraction failed: {}", e);
                None
            }
        }
    }

    async fn upload(
        &self,
        job: &RenameJob,
        path: &Path,
        new_name: &str,
        thumbnail: Option<&Path>,
        info: Option<&MediaInfo>,
    ) -> Result<Message, PipelineError> {
        let input = InputFile::file(path.to_path_buf()).file_name(new_name.to_string());
        let caption = format!("<code>{}</code>", html_escape(new_name));
        let thumb = thumbnail.map(|t| InputFile::file(t.to_path_buf()));

        let sent = match naming::upload_as(job.file.kind, new_name, job.settings.media_type) {
            UploadAs::Document => {
                let mut req = self
                    .bot
                    .send_document(job.chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .disable_content_type_detection(true);
                if let Some(thumb) = thumb {
                    req = req.thumbnail(thumb);
                }
                req.await?
            }
            UploadAs::Video => {
                let mut req = self
                    .bot
                    .send_video(job.chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .supports_streaming(true);
                let dims = info
                    .and_then(|i| i.width.zip(i.height))
                    .or(job.file.width.zip(job.file.height));
                if let Some((w, h)) = dims {
                    req = req.width(w).height(h);
                }
                if let Some(thumb) = thumb {
                    req = req.thumbnail(thumb);
                }
                req.await?
            }
            UploadAs::Audio => {
                let mut req = self
                    .bot
                    .send_audio(job.chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(thumb) = thumb {
                    req = req.thumbnail(thumb);
                }
                req.await?
            }
        };

        Ok(sent)
    }

    /// Copy the uploaded message to every dump channel. Returns how many
    /// channels received it.
    async fn forward_to_dumps(&self, job: &RenameJob, message_id: MessageId) -> usize {
        let channels = match self.dumps.active().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Could not load dump channels: {:#}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for channel in channels {
            let result = self
                .bot
                .copy_message(ChatId(channel.channel_id), job.chat_id, message_id)
                .caption(format!("📦 Auto-forwarded\n👤 User: <code>{}</code>", job.user_id))
                .parse_mode(ParseMode::Html)
                .await;
            match result {
                Ok(_) => delivered += 1,
                Err(e) => warn!(
                    "Failed to forward to dump channel {} ({}): {}",
                    channel.channel_id, channel.channel_name, e
                ),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_file_rejected_before_processing() {
        let max = crate::config::DEFAULT_MAX_FILE_SIZE;
        assert!(check_size(max, max).is_ok());

        let err = check_size(max + 1, max).unwrap_err();
        assert!(matches!(err, PipelineError::TooLarge { .. }));
        assert_eq!(err.user_message(), "❌ File too large. Maximum size allowed: 5.0 GB");
    }

    #[test]
    fn test_progress_text() {
        let text = progress_text("📥 Downloading", 512 * 1024, 1024 * 1024);
        assert!(text.starts_with("📥 Downloading… 50%"));
        assert!(text.contains("[■■■■■□□□□□]"));
        assert!(text.ends_with("512.0 KB / 1.0 MB"));

        assert_eq!(progress_text("Working", 10, 0), "Working…\n10 B");
    }
}
