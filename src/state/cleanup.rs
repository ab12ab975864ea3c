use crate::pipeline::intake::scratch_files_in;
use crate::state::AppState;
use crate::utils::AppConfig;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::time::interval;
use tracing::{info, warn};

pub struct CleanupManager {
    state: AppState,
    session_ttl: Duration,
    scratch_dir: PathBuf,
}

impl CleanupManager {
    pub fn new(state: AppState, session_ttl: Duration, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            state,
            session_ttl,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Cleanup for the configured TTL and scratch directory (the system temp
    /// directory when none is set).
    pub fn from_config(state: AppState, config: &AppConfig) -> Self {
        let scratch_dir = config
            .intake
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Self::new(
            state,
            Duration::from_secs(config.cleanup.session_ttl_minutes * 60),
            scratch_dir,
        )
    }

    pub async fn run_cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport {
            sessions_removed: self.state.remove_idle_sessions(self.session_ttl).await,
            ..CleanupReport::default()
        };

        self.cleanup_scratch_files(&mut report);

        info!(
            sessions_removed = report.sessions_removed,
            scratch_files_deleted = report.scratch_files_deleted,
            bytes_freed = report.bytes_freed,
            "Cleanup completed"
        );

        report
    }

    /// Removes scratch files older than the session TTL. Live ones belong to
    /// running jobs and are younger than that.
    fn cleanup_scratch_files(&self, report: &mut CleanupReport) {
        let now = SystemTime::now();

        for path in scratch_files_in(&self.scratch_dir) {
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= self.session_ttl {
                continue;
            }

            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to delete scratch file");
            } else {
                report.scratch_files_deleted += 1;
                report.bytes_freed += metadata.len();
            }
        }
    }

    pub fn start_background_cleanup(self, cleanup_interval: Duration) {
        tokio::spawn(async move {
            let mut timer = interval(cleanup_interval);

            loop {
                timer.tick().await;
                let report = self.run_cleanup().await;
                tracing::debug!(?report, "Background cleanup completed");
            }
        });
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions_removed: usize,
    pub scratch_files_deleted: usize,
    pub bytes_freed: u64,
}
