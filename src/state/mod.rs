pub mod cleanup;

pub use cleanup::{CleanupManager, CleanupReport};

use crate::pipeline::{
    translate_file, DownloadLink, PipelineOptions, ProgressEvent, ProgressSink, UploadedFile,
};
use crate::translation::{find_language, GoogleTranslateClient};
use crate::utils::{AppConfig, Result, VsdxTranslatorError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Client built from server-side credentials, shared by every session.
    pub default_client: Option<Arc<GoogleTranslateClient>>,
    pub sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

pub struct SessionState {
    pub session_id: String,
    /// Bumped on reset so the page renders a fresh upload control.
    pub uploader_generation: u64,
    pub client: Option<Arc<GoogleTranslateClient>>,
    pub target_lang: String,
    pub messages: Vec<Message>,
    job: Option<watch::Receiver<JobSnapshot>>,
    last_seen: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: MessageLevel::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { level: MessageLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: MessageLevel::Error, text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Queued,
    Translating {
        percent: u8,
    },
    Done {
        percent: u8,
        words: usize,
        download: DownloadLink,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub name: String,
    pub total_words: usize,
    pub status: FileStatus,
}

/// What a session's job looks like right now. Published through a watch
/// channel, so readers only ever see the latest state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub target_lang: String,
    pub files: Vec<FileReport>,
    pub finished: bool,
}

impl JobSnapshot {
    pub fn queued(target_lang: &str, uploads: &[UploadedFile]) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            files: uploads
                .iter()
                .map(|u| FileReport {
                    name: u.name.clone(),
                    total_words: 0,
                    status: FileStatus::Queued,
                })
                .collect(),
            finished: false,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Done { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
            .count()
    }

    /// Closes out a job whose task ended without finishing it. Files that
    /// never reached a final state are failed.
    fn abandoned(mut self) -> Self {
        for file in &mut self.files {
            if matches!(file.status, FileStatus::Queued | FileStatus::Translating { .. }) {
                file.status = FileStatus::Failed {
                    error: "Translation stopped unexpectedly".to_string(),
                };
            }
        }
        self.finished = true;
        self
    }
}

/// Publishes pipeline events for the file at `index` into the job snapshot.
struct WatchProgress {
    tx: watch::Sender<JobSnapshot>,
    index: usize,
}

impl ProgressSink for WatchProgress {
    fn report(&mut self, event: ProgressEvent) {
        let index = self.index;
        self.tx.send_modify(|snapshot| {
            let Some(file) = snapshot.files.get_mut(index) else {
                return;
            };
            match event {
                ProgressEvent::Started { total_words, .. } => {
                    file.total_words = total_words;
                    file.status = FileStatus::Translating { percent: 0 };
                }
                ProgressEvent::Progress { percent, .. } => {
                    file.status = FileStatus::Translating { percent };
                }
                ProgressEvent::Failed { error, .. } => {
                    file.status = FileStatus::Failed { error };
                }
                // The download is attached once the result is in hand.
                ProgressEvent::Completed { .. } => {}
            }
        });
    }
}

impl SessionState {
    pub fn new(session_id: String, target_lang: String) -> Self {
        Self {
            session_id,
            uploader_generation: 0,
            client: None,
            target_lang,
            messages: Vec::new(),
            job: None,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    pub fn uploader_key(&self) -> String {
        format!("uploader_{}", self.uploader_generation)
    }

    /// The job's latest state. A job whose sender is gone is over, whether
    /// or not its task got to mark it finished.
    pub fn job_snapshot(&self) -> Option<JobSnapshot> {
        self.job.as_ref().map(|rx| {
            let snapshot = rx.borrow().clone();
            if !snapshot.finished && rx.has_changed().is_err() {
                snapshot.abandoned()
            } else {
                snapshot
            }
        })
    }

    pub fn is_job_running(&self) -> bool {
        self.job_snapshot().is_some_and(|s| !s.finished)
    }

    /// Clears the finished job and forces a fresh upload control.
    pub fn reset(&mut self) -> u64 {
        self.uploader_generation += 1;
        self.job = None;
        self.messages.clear();
        self.uploader_generation
    }
}

impl AppState {
    pub fn new(config: AppConfig, default_client: Option<GoogleTranslateClient>) -> Self {
        Self {
            config: Arc::new(config),
            default_client: default_client.map(Arc::new),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = SessionState::new(
            session_id.clone(),
            self.config.translation.default_target_lang.clone(),
        );
        self.sessions.write().await.insert(session_id.clone(), session);
        info!(session_id = %session_id, "Session opened");
        session_id
    }

    /// Runs `f` against the session, refreshing its idle timer.
    pub async fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Result<R> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| VsdxTranslatorError::SessionNotFound(session_id.to_string()))?;
        session.touch();
        Ok(f(session))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the session can translate without uploading a key first.
    pub async fn has_client(&self, session_id: &str) -> Result<bool> {
        let default = self.default_client.is_some();
        self.with_session(session_id, |s| default || s.client.is_some())
            .await
    }

    /// Builds a client from an uploaded service-account key and binds it to
    /// the session. Returns the service account's email.
    pub async fn authenticate(&self, session_id: &str, credentials: &[u8]) -> Result<String> {
        let client = match GoogleTranslateClient::from_credentials_json(credentials, &self.config) {
            Ok(client) => client,
            Err(e) => {
                let message = Message::error(e.to_string());
                self.with_session(session_id, |s| s.messages.push(message)).await?;
                return Err(e);
            }
        };
        let account = client.account().unwrap_or_default().to_string();
        let client = Arc::new(client);

        self.with_session(session_id, move |s| {
            s.client = Some(client);
            s.messages.push(Message::success(
                "Authentication successful. Please select the files you wish to translate.",
            ));
        })
        .await?;
        info!(session_id = %session_id, account = %account, "Session authenticated");
        Ok(account)
    }

    /// Starts translating `uploads` in the background. Progress is read back
    /// through [`SessionState::job_snapshot`].
    pub async fn start_job(
        &self,
        session_id: &str,
        language: &str,
        uploads: Vec<UploadedFile>,
    ) -> Result<()> {
        let language = find_language(language)
            .ok_or_else(|| VsdxTranslatorError::UnsupportedLanguage(language.to_string()))?;
        if uploads.is_empty() {
            return Err(VsdxTranslatorError::ConfigError(
                "Select at least one .vsdx file".to_string(),
            ));
        }

        let default_client = self.default_client.clone();
        let (tx, rx) = watch::channel(JobSnapshot::queued(language.code, &uploads));
        let client = self
            .with_session(session_id, |s| {
                if s.is_job_running() {
                    return Err(VsdxTranslatorError::JobInProgress(s.session_id.clone()));
                }
                let client = s.client.clone().or(default_client).ok_or_else(|| {
                    VsdxTranslatorError::CredentialsError(
                        "Upload a service account key before translating".to_string(),
                    )
                })?;
                s.target_lang = language.code.to_string();
                s.messages.clear();
                s.job = Some(rx);
                Ok(client)
            })
            .await??;

        let options = PipelineOptions {
            target_lang: language.code.to_string(),
            scratch_dir: self.config.intake.scratch_dir.clone(),
            translate_file_name: true,
            max_unpacked_bytes: self.config.max_unpacked_bytes(),
        };
        info!(
            session_id = %session_id,
            files = uploads.len(),
            target_lang = %language.code,
            "Translation job started"
        );
        tokio::spawn(run_job(client, uploads, options, tx, session_id.to_string()));
        Ok(())
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<Option<JobSnapshot>> {
        self.with_session(session_id, |s| s.job_snapshot()).await
    }

    pub async fn reset(&self, session_id: &str) -> Result<u64> {
        self.with_session(session_id, |s| {
            if s.is_job_running() {
                return Err(VsdxTranslatorError::JobInProgress(s.session_id.clone()));
            }
            Ok(s.reset())
        })
        .await?
    }

    /// Drops sessions idle for longer than `ttl`. Sessions with a running
    /// job are kept.
    pub async fn remove_idle_sessions(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, s| {
            let keep = s.is_job_running() || s.idle_for() <= ttl;
            if !keep {
                info!(session_id = %id, "Removing idle session");
            }
            keep
        });
        before - sessions.len()
    }
}

async fn run_job(
    client: Arc<GoogleTranslateClient>,
    uploads: Vec<UploadedFile>,
    options: PipelineOptions,
    tx: watch::Sender<JobSnapshot>,
    session_id: String,
) {
    let mut sink = WatchProgress { tx, index: 0 };

    for (index, upload) in uploads.iter().enumerate() {
        sink.index = index;
        match translate_file(&client, upload, &options, &mut sink).await {
            Ok(file) => {
                let download = file.download_link();
                sink.tx.send_modify(|snapshot| {
                    if let Some(report) = snapshot.files.get_mut(index) {
                        report.status = FileStatus::Done {
                            percent: 100,
                            words: file.words_translated,
                            download,
                        };
                    }
                });
            }
            Err(e) if e.aborts_batch() => {
                warn!(session_id = %session_id, error = %e, "Credentials rejected, stopping job");
                let reason = format!("Skipped: {}", e);
                sink.tx.send_modify(|snapshot| {
                    for report in snapshot.files.iter_mut().skip(index + 1) {
                        report.status = FileStatus::Failed { error: reason.clone() };
                    }
                });
                break;
            }
            Err(e) => {
                warn!(session_id = %session_id, file = %upload.name, error = %e, "File failed");
            }
        }
    }

    sink.tx.send_modify(|snapshot| snapshot.finished = true);
    let snapshot = sink.tx.borrow();
    info!(
        session_id = %session_id,
        completed = snapshot.completed_count(),
        failed = snapshot.failed_count(),
        "Translation job finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::fixtures::{shape, VsdxFixture};
    use crate::diagram::{ShapeRef, VisioDocument};
    use crate::translation::testing::{config_for, fake_google};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    async fn state_with_client() -> AppState {
        let config = config_for(fake_google().await);
        let client = GoogleTranslateClient::with_access_token("test-token", &config).unwrap();
        AppState::new(config, Some(client))
    }

    async fn wait_for_finish(state: &AppState, session_id: &str) -> JobSnapshot {
        for _ in 0..200 {
            if let Some(snapshot) = state.snapshot(session_id).await.unwrap() {
                if snapshot.finished {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job did not finish");
    }

    #[tokio::test]
    async fn job_translates_files_and_attaches_downloads() {
        let state = state_with_client().await;
        let id = state.create_session().await;
        let uploads = vec![
            UploadedFile::new(
                "greeting.vsdx",
                VsdxFixture::new()
                    .page("Page-1", &shape(1, "Hello world"))
                    .page("Page-2", &shape(2, ""))
                    .build(),
            ),
            UploadedFile::new("broken.vsdx", b"not a zip".to_vec()),
        ];

        state.start_job(&id, "Spanish", uploads).await.unwrap();
        let snapshot = wait_for_finish(&state, &id).await;

        assert_eq!(snapshot.target_lang, "es");
        assert_eq!(snapshot.completed_count(), 1);
        assert_eq!(snapshot.failed_count(), 1);

        let FileStatus::Done { percent, words, download } = &snapshot.files[0].status else {
            panic!("first file not done: {:?}", snapshot.files[0].status);
        };
        assert_eq!((*percent, *words), (100, 2));
        assert_eq!(snapshot.files[0].total_words, 2);
        assert_eq!(download.file_name, "es_greeting.vsdx");

        let payload = download
            .data_uri
            .strip_prefix("data:application/octet-stream;base64,")
            .unwrap();
        let doc = VisioDocument::from_bytes(&STANDARD.decode(payload).unwrap()).unwrap();
        assert_eq!(doc.shape_text(ShapeRef { page: 0, shape: 0 }).as_deref(), Some("Hola mundo"));
    }

    #[tokio::test]
    async fn job_needs_a_client_and_a_known_language() {
        let state = AppState::new(AppConfig::default(), None);
        let id = state.create_session().await;
        let upload = UploadedFile::new("a.vsdx", VsdxFixture::new().page("P", &shape(1, "x")).build());

        let err = state.start_job(&id, "Klingon", vec![upload.clone()]).await.unwrap_err();
        assert!(matches!(err, VsdxTranslatorError::UnsupportedLanguage(_)));

        let err = state.start_job(&id, "fr", vec![upload]).await.unwrap_err();
        assert!(err.aborts_batch());
        assert!(!state.has_client(&id).await.unwrap());
    }

    #[tokio::test]
    async fn uploaded_credentials_are_checked() {
        let state = AppState::new(AppConfig::default(), None);
        let id = state.create_session().await;

        let err = state
            .authenticate(&id, br#"{"type": "authorized_user"}"#)
            .await
            .unwrap_err();
        assert!(err.aborts_batch());
        let messages = state.with_session(&id, |s| s.messages.clone()).await.unwrap();
        assert_eq!(messages.last().unwrap().level, MessageLevel::Error);

        let key = include_str!("../../tests/fixtures/service-account.json");
        let account = state.authenticate(&id, key.as_bytes()).await.unwrap();
        assert_eq!(account, "translator@vsdx-translator-test.iam.gserviceaccount.com");
        assert!(state.has_client(&id).await.unwrap());
    }

    #[tokio::test]
    async fn reset_bumps_generation_and_clears_job() {
        let state = state_with_client().await;
        let id = state.create_session().await;
        let upload = UploadedFile::new("a.vsdx", VsdxFixture::new().page("P", &shape(1, "x")).build());
        state.start_job(&id, "de", vec![upload]).await.unwrap();
        wait_for_finish(&state, &id).await;

        assert_eq!(state.reset(&id).await.unwrap(), 1);
        assert_eq!(state.reset(&id).await.unwrap(), 2);
        assert!(state.snapshot(&id).await.unwrap().is_none());
        let key = state.with_session(&id, |s| s.uploader_key()).await.unwrap();
        assert_eq!(key, "uploader_2");
    }

    #[tokio::test]
    async fn unknown_sessions_are_reported() {
        let state = AppState::new(AppConfig::default(), None);
        let err = state.reset("missing").await.unwrap_err();
        assert!(matches!(err, VsdxTranslatorError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn idle_sessions_are_removed_but_running_ones_kept() {
        let state = AppState::new(AppConfig::default(), None);
        let idle = state.create_session().await;
        let busy = state.create_session().await;

        let (_tx, rx) = watch::channel(JobSnapshot::default());
        state.with_session(&busy, |s| s.job = Some(rx)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(state.remove_idle_sessions(Duration::ZERO).await, 1);
        assert!(state.snapshot(&idle).await.is_err());
        assert!(state.snapshot(&busy).await.is_ok());
    }

    #[tokio::test]
    async fn job_whose_task_died_counts_as_finished() {
        let state = AppState::new(AppConfig::default(), None);
        let id = state.create_session().await;
        let uploads = vec![
            UploadedFile::new("a.vsdx", Vec::new()),
            UploadedFile::new("b.vsdx", Vec::new()),
        ];

        let (tx, rx) = watch::channel(JobSnapshot::queued("fr", &uploads));
        tx.send_modify(|s| s.files[0].status = FileStatus::Translating { percent: 40 });
        state.with_session(&id, |s| s.job = Some(rx)).await.unwrap();
        drop(tx);

        let snapshot = state.snapshot(&id).await.unwrap().unwrap();
        assert!(snapshot.finished);
        assert_eq!(snapshot.failed_count(), 2);
        assert!(!state.with_session(&id, |s| s.is_job_running()).await.unwrap());

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.remove_idle_sessions(Duration::ZERO).await, 1);

        let id = state.create_session().await;
        let (tx, rx) = watch::channel(JobSnapshot::queued("fr", &uploads));
        state.with_session(&id, |s| s.job = Some(rx)).await.unwrap();
        drop(tx);
        assert_eq!(state.reset(&id).await.unwrap(), 1);
    }
}
