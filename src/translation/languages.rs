use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub name: &'static str,
    pub code: &'static str,
}

/// Languages offered in the UI. The service accepts more codes than these.
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { name: "Spanish", code: "es" },
    Language { name: "Portuguese", code: "pt" },
    Language { name: "French", code: "fr" },
    Language { name: "German", code: "de" },
    Language { name: "Chinese (Simplified)", code: "zh-CN" },
    Language { name: "Korean", code: "ko" },
];

/// Looks a language up by code or display name, ignoring case.
pub fn find_language(query: &str) -> Option<Language> {
    let query = query.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(query) || l.name.eq_ignore_ascii_case(query))
        .copied()
}

pub fn language_name(code: &str) -> Option<&'static str> {
    find_language(code).map(|l| l.name)
}
