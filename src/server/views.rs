use crate::state::{FileReport, FileStatus, JobSnapshot, Message, MessageLevel};
use crate::translation::{language_name, SUPPORTED_LANGUAGES};
use crate::utils::escape_html;
use std::fmt::Write as _;

pub const TITLE: &str = "VSDX Translator - Multi files";
pub const SUBHEADER: &str = "This version allows you to translate VSDX files into multiple languages.";

/// Everything the session page shows.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session_id: String,
    pub uploader_key: String,
    pub target_lang: String,
    pub needs_credentials: bool,
    pub messages: Vec<Message>,
    pub job: Option<JobSnapshot>,
    pub refresh_seconds: u64,
}

impl SessionView {
    fn job_running(&self) -> bool {
        self.job.as_ref().map(|j| !j.finished).unwrap_or(false)
    }
}

pub fn session_page(view: &SessionView) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>{}</h1>", TITLE);
    let _ = writeln!(body, "<h3>{}</h3>", SUBHEADER);

    for message in &view.messages {
        body.push_str(&message_box(message));
    }

    if view.needs_credentials {
        body.push_str(&credentials_form(&view.session_id));
    } else if view.job.is_none() {
        body.push_str(&translate_form(view));
    }

    if let Some(job) = &view.job {
        body.push_str(&job_section(&view.session_id, job));
    }

    let refresh = if view.job_running() {
        format!(r#"<meta http-equiv="refresh" content="{}">"#, view.refresh_seconds)
    } else {
        String::new()
    };
    layout(TITLE, &refresh, &body)
}

pub fn error_page(status: u16, message: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n{}<p><a href=\"/\">Start over</a></p>\n",
        TITLE,
        message_box(&Message::error(format!("{} ({})", message, status)))
    );
    layout(TITLE, "", &body)
}

fn layout(title: &str, head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        head,
        STYLE,
        body
    )
}

const STYLE: &str = "body{font-family:sans-serif;max-width:46rem;margin:2rem auto}\
.msg{padding:.6rem 1rem;margin:.5rem 0;border-radius:.3rem}\
.info{background:#e7f0fb}.success{background:#e5f5e8}.error{background:#fbe9e9}\
progress{width:100%}";

fn message_box(message: &Message) -> String {
    let class = match message.level {
        MessageLevel::Info => "info",
        MessageLevel::Success => "success",
        MessageLevel::Error => "error",
    };
    format!("<div class=\"msg {}\">{}</div>\n", class, escape_html(&message.text))
}

fn credentials_form(session_id: &str) -> String {
    format!(
        concat!(
            "<form method=\"post\" action=\"/session/{id}/credentials\" enctype=\"multipart/form-data\">\n",
            "<label for=\"credentials\">Upload Google Cloud Service Account JSON</label>\n",
            "<input type=\"file\" id=\"credentials\" name=\"credentials\" accept=\".json\" required>\n",
            "<button type=\"submit\">Authenticate</button>\n",
            "</form>\n"
        ),
        id = escape_html(session_id)
    )
}

fn translate_form(view: &SessionView) -> String {
    let mut options = String::new();
    for language in SUPPORTED_LANGUAGES {
        let selected = if language.code == view.target_lang { " selected" } else { "" };
        let _ = writeln!(
            options,
            "<option value=\"{}\"{}>{}</option>",
            language.code, selected, language.name
        );
    }

    format!(
        concat!(
            "<form method=\"post\" action=\"/session/{id}/translate\" enctype=\"multipart/form-data\">\n",
            "<label for=\"language\">Choose the language to translate to:</label>\n",
            "<select id=\"language\" name=\"language\">\n{options}</select>\n",
            "<label for=\"{key}\">Select .VSDX files</label>\n",
            "<input type=\"file\" id=\"{key}\" name=\"files\" accept=\".vsdx\" multiple required>\n",
            "<button type=\"submit\">Translate</button>\n",
            "</form>\n"
        ),
        id = escape_html(&view.session_id),
        options = options,
        key = escape_html(&view.uploader_key)
    )
}

fn job_section(session_id: &str, job: &JobSnapshot) -> String {
    let language = language_name(&job.target_lang).unwrap_or(job.target_lang.as_str());
    let mut section = String::new();

    for file in &job.files {
        section.push_str(&file_block(file, language));
    }

    if job.finished {
        section.push_str(&message_box(&Message::success(
            "Please refresh the page to restart the app and translate more files.",
        )));
        let _ = writeln!(
            section,
            "<form method=\"post\" action=\"/session/{}/reset\"><button type=\"submit\">Translate more files</button></form>",
            escape_html(session_id)
        );
    }
    section
}

fn file_block(file: &FileReport, language: &str) -> String {
    let name = &file.name;
    match &file.status {
        FileStatus::Queued => message_box(&Message::info(format!("Waiting: {}", name))),
        FileStatus::Translating { percent } => format!(
            "{}{}",
            message_box(&Message::info(format!(
                "Translating {} to {}: {} words to be translated. Please wait...",
                name, language, file.total_words
            ))),
            progress_bar(*percent)
        ),
        FileStatus::Done { percent, download, .. } => format!(
            "{}{}<p>{}</p>\n",
            message_box(&Message::success(format!(
                "File {} translated to {}! Click the link below to download it.",
                name, language
            ))),
            progress_bar(*percent),
            download.to_anchor()
        ),
        FileStatus::Failed { error } => {
            message_box(&Message::error(format!("File {} could not be translated: {}", name, error)))
        }
    }
}

fn progress_bar(percent: u8) -> String {
    format!("<progress value=\"{}\" max=\"100\">{}%</progress>\n", percent, percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DownloadLink;

    fn view() -> SessionView {
        SessionView {
            session_id: "abc".to_string(),
            uploader_key: "uploader_3".to_string(),
            target_lang: "fr".to_string(),
            needs_credentials: false,
            messages: Vec::new(),
            job: None,
            refresh_seconds: 2,
        }
    }

    fn job(status: FileStatus, finished: bool) -> JobSnapshot {
        JobSnapshot {
            target_lang: "es".to_string(),
            files: vec![FileReport {
                name: "<plan>.vsdx".to_string(),
                total_words: 12,
                status,
            }],
            finished,
        }
    }

    #[test]
    fn idle_page_offers_languages_and_a_generation_keyed_uploader() {
        let html = session_page(&view());
        assert!(html.contains(TITLE));
        assert!(html.contains(SUBHEADER));
        assert!(html.contains(r#"<option value="fr" selected>French</option>"#));
        assert!(html.contains(r#"<option value="zh-CN">Chinese (Simplified)</option>"#));
        assert!(html.contains(r#"id="uploader_3""#));
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn credential_form_replaces_uploader_until_authenticated() {
        let mut view = view();
        view.needs_credentials = true;
        let html = session_page(&view);
        assert!(html.contains("Upload Google Cloud Service Account JSON"));
        assert!(!html.contains("Select .VSDX files"));
    }

    #[test]
    fn running_job_refreshes_and_shows_word_count() {
        let mut view = view();
        view.job = Some(job(FileStatus::Translating { percent: 40 }, false));
        let html = session_page(&view);
        assert!(html.contains(r#"<meta http-equiv="refresh" content="2">"#));
        assert!(html.contains(
            "Translating &lt;plan&gt;.vsdx to Spanish: 12 words to be translated. Please wait..."
        ));
        assert!(html.contains(r#"<progress value="40" max="100">"#));
        assert!(!html.contains("Select .VSDX files"));
    }

    #[test]
    fn finished_job_links_downloads_and_offers_reset() {
        let mut view = view();
        view.job = Some(job(
            FileStatus::Done {
                percent: 100,
                words: 12,
                download: DownloadLink::new("plan.vsdx", b"PK"),
            },
            true,
        ));
        let html = session_page(&view);
        assert!(html.contains("translated to Spanish! Click the link below to download it."));
        assert!(html.contains(r#"download="plan.vsdx""#));
        assert!(html.contains("/session/abc/reset"));
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn messages_are_escaped() {
        let mut view = view();
        view.messages.push(Message::error("<script>"));
        let html = session_page(&view);
        assert!(html.contains(r#"<div class="msg error">&lt;script&gt;</div>"#));
    }
}
