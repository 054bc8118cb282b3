//! Periodic removal of leftovers in the download and temp directories.
//!
//! Jobs clean up after themselves; the sweeper only catches files left
//! behind by crashes or killed processes.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const MAX_FILE_AGE: Duration = Duration::from_secs(60 * 60);

/// Prefix of a job's working directory under `DOWNLOAD_PATH`.
pub const JOB_DIR_PREFIX: &str = "job_";
/// Prefix of a job's thumbnail directory under `TEMP_PATH`.
pub const SCRATCH_DIR_PREFIX: &str = "thumb_";

/// Tells the sweeper which paths still belong to a running job.
pub type InUse = dyn Fn(&Path) -> bool + Send + Sync;

/// User id encoded in a job directory name such as `job_42_Xa81`.
pub fn job_dir_owner(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let rest = name
        .strip_prefix(JOB_DIR_PREFIX)
        .or_else(|| name.strip_prefix(SCRATCH_DIR_PREFIX))?;
    rest.split('_').next()?.parse().ok()
}

/// Whether an entry last modified at `modified` should be removed.
pub fn is_stale(modified: SystemTime, now: SystemTime, max_age: Duration) -> bool {
    now.duration_since(modified)
        .map(|age| age > max_age)
        .unwrap_or(false)
}

/// Start the background sweeper. Top-level entries for which `in_use`
/// returns true are left alone.
pub fn spawn_sweeper<F>(dirs: Vec<PathBuf>, interval: Duration, max_age: Duration, in_use: F) -> JoinHandle<()>
where
    F: Fn(&Path) -> bool + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; startup leftovers go too.
        loop {
            ticker.tick().await;
            let now = SystemTime::now();
            let mut removed = 0;
            for dir in &dirs {
                removed += sweep(dir.clone(), now, max_age, &in_use).await;
            }
            if removed > 0 {
                info!("Cleanup removed {} stale entries", removed);
            }
        }
    })
}

/// Remove stale files below `dir` and any directories left empty, except
/// entries of `dir` that are still in use. Returns the number of removed
/// entries.
pub fn sweep(dir: PathBuf, now: SystemTime, max_age: Duration, in_use: &InUse) -> BoxFuture<'_, usize> {
    async move {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping sweep of {}: {}", dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if in_use(&path) {
                debug!("Skipping {}, job still running", path.display());
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };

            if meta.is_dir() {
                removed += sweep(path.clone(), now, max_age, &|_: &Path| false).await;
                if is_empty_dir(&path).await && modified_stale(&meta, now, max_age) {
                    match tokio::fs::remove_dir(&path).await {
                        Ok(()) => removed += 1,
                        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                    }
                }
            } else if modified_stale(&meta, now, max_age) {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                }
            }
        }
        removed
    }
    .boxed()
}

fn modified_stale(meta: &std::fs::Metadata, now: SystemTime, max_age: Duration) -> bool {
    meta.modified()
        .map(|m| is_stale(m, now, max_age))
        .unwrap_or(false)
}

async fn is_empty_dir(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::JobTracker;

    #[test]
    fn test_is_stale() {
        let now = SystemTime::now();
        let hour = Duration::from_secs(3600);

        assert!(is_stale(now - Duration::from_secs(3601), now, hour));
        assert!(!is_stale(now - Duration::from_secs(60), now, hour));
        // Clock skew: modified in the future.
        assert!(!is_stale(now + Duration::from_secs(60), now, hour));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_entries() {
        let root = tempfile::tempdir().unwrap();
        let job = root.path().join("job_1");
        std::fs::create_dir(&job).unwrap();
        std::fs::write(job.join("movie.mkv"), b"data").unwrap();
        std::fs::write(root.path().join("fresh.txt"), b"x").unwrap();

        // Nothing is old yet.
        let removed = sweep(root.path().to_path_buf(), SystemTime::now(), MAX_FILE_AGE, &|_: &Path| false).await;
        assert_eq!(removed, 0);
        assert!(job.join("movie.mkv").exists());

        // Pretend two hours have passed.
        let later = SystemTime::now() + Duration::from_secs(2 * 3600);
        let removed = sweep(root.path().to_path_buf(), later, MAX_FILE_AGE, &|_: &Path| false).await;
        assert_eq!(removed, 3);
        assert!(!job.exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_job_dir_owner() {
        assert_eq!(job_dir_owner(Path::new("/dl/job_42_Xa81")), Some(42));
        assert_eq!(job_dir_owner(Path::new("/tmp/thumb_7_q")), Some(7));
        assert_eq!(job_dir_owner(Path::new("/dl/job_abc")), None);
        assert_eq!(job_dir_owner(Path::new("/dl/fresh.txt")), None);
    }

    #[tokio::test]
    async fn test_sweep_spares_running_jobs() {
        let jobs = JobTracker::new();
        let slot = jobs.try_start(42).unwrap();

        let root = tempfile::tempdir().unwrap();
        let live = root.path().join("job_42_live");
        let scratch = root.path().join("thumb_42_live");
        let abandoned = root.path().join("job_9_old");
        for dir in [&live, &scratch, &abandoned] {
            std::fs::create_dir(dir).unwrap();
        }
        std::fs::write(live.join("source.mkv"), b"downloading").unwrap();
        std::fs::write(abandoned.join("source.mkv"), b"left over").unwrap();

        let tracker = jobs.clone();
        let in_use = move |path: &Path| job_dir_owner(path).is_some_and(|uid| tracker.is_busy(uid));
        let later = SystemTime::now() + Duration::from_secs(2 * 3600);

        let removed = sweep(root.path().to_path_buf(), later, MAX_FILE_AGE, &in_use).await;
        assert_eq!(removed, 2);
        assert!(live.join("source.mkv").exists());
        assert!(scratch.exists());
        assert!(!abandoned.exists());

        // Once the job is over its leftovers are fair game.
        jobs.finish(slot);
        let removed = sweep(root.path().to_path_buf(), later, MAX_FILE_AGE, &in_use).await;
        assert_eq!(removed, 3);
        assert!(!live.exists());
    }
}
