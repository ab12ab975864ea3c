use crate::pipeline::UploadedFile;
use crate::server::{views, AppError};
use crate::state::{AppState, JobSnapshot, Message};
use crate::translation::SUPPORTED_LANGUAGES;
use crate::utils::VsdxTranslatorError;
use axum::{
    extract::{Multipart, Path, State},
    response::{Html, IntoResponse, Redirect},
    Json,
};
use tracing::{info, warn};

fn session_url(id: &str) -> String {
    format!("/session/{}", id)
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "vsdx-translator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn info(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": state.config.server.name,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Translate the shape text of Visio (.vsdx) diagrams with Google Translate",
        "languages": SUPPORTED_LANGUAGES,
        "server_credentials": state.default_client.is_some(),
        "sessions": state.session_count().await,
        "endpoints": {
            "GET /": "Open a translation session",
            "GET /session/{id}": "Session page",
            "POST /session/{id}/credentials": "Upload a service account key",
            "POST /session/{id}/translate": "Translate uploaded diagrams",
            "GET /session/{id}/progress": "Job progress",
            "POST /session/{id}/reset": "Clear the job and upload more files",
            "GET /health": "Health check",
            "GET /info": "Server info"
        }
    }))
}

pub async fn index(State(state): State<AppState>) -> Redirect {
    let id = state.create_session().await;
    Redirect::to(&session_url(&id))
}

pub async fn session_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let has_default = state.default_client.is_some();
    let refresh_seconds = state.config.server.refresh_seconds;

    let view = state
        .with_session(&id, |s| views::SessionView {
            session_id: s.session_id.clone(),
            uploader_key: s.uploader_key(),
            target_lang: s.target_lang.clone(),
            needs_credentials: !has_default && s.client.is_none(),
            messages: s.messages.clone(),
            job: s.job_snapshot(),
            refresh_seconds,
        })
        .await?;

    Ok(Html(views::session_page(&view)))
}

pub async fn upload_credentials(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut credentials = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("credentials") {
            credentials = Some(field.bytes().await?);
        }
    }
    let credentials =
        credentials.ok_or_else(|| AppError::BadRequest("missing credentials field".to_string()))?;

    // A rejected key is reported on the page, not as an error response.
    match state.authenticate(&id, &credentials).await {
        Ok(_) => {}
        Err(e @ VsdxTranslatorError::SessionNotFound(_)) => return Err(e.into()),
        Err(e) => warn!(session_id = %id, error = %e, "Credential upload rejected"),
    }
    Ok(Redirect::to(&session_url(&id)))
}

pub async fn translate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut language = None;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("language") => language = Some(field.text().await?),
            Some("files") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when nothing was selected.
                if name.is_empty() && bytes.is_empty() {
                    continue;
                }
                uploads.push(UploadedFile::new(name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let language = language.ok_or_else(|| AppError::BadRequest("missing language field".to_string()))?;
    info!(session_id = %id, files = uploads.len(), language = %language, "Translation requested");

    // Uploads are not checked here; a file that is not a diagram fails in
    // its own progress slot.
    match state.start_job(&id, &language, uploads).await {
        Ok(()) => {}
        Err(e @ VsdxTranslatorError::SessionNotFound(_)) => return Err(e.into()),
        Err(e) => {
            warn!(session_id = %id, error = %e, "Translation not started");
            let message = Message::error(e.to_string());
            state.with_session(&id, |s| s.messages.push(message)).await?;
        }
    }
    Ok(Redirect::to(&session_url(&id)))
}

pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<JobSnapshot>>, AppError> {
    Ok(Json(state.snapshot(&id).await?))
}

pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let generation = state.reset(&id).await?;
    info!(session_id = %id, generation, "Session reset");
    Ok(Redirect::to(&session_url(&id)))
}
