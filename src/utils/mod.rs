pub mod config;
pub mod errors;

pub use config::{AppConfig, CREDENTIALS_ENV_VAR};
pub use errors::{ErrorCategory, Result, VsdxTranslatorError};

/// Whitespace-delimited word count, the unit progress is measured in.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Makes a translated name safe to use as a single path component.
pub fn sanitize_file_name(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "translated".to_string()
    } else {
        cleaned
    }
}
