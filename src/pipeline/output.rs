use crate::diagram::VisioDocument;
use crate::pipeline::intake::{ScratchFile, SCRATCH_SUFFIX};
use crate::translation::Translator;
use crate::utils::{escape_html, sanitize_file_name, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use std::path::Path;

/// A finished file, ready to hand to the user.
#[derive(Debug, Clone)]
pub struct TranslatedFile {
    pub original_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub shapes_translated: usize,
    pub words_translated: usize,
}

impl TranslatedFile {
    pub fn download_link(&self) -> DownloadLink {
        DownloadLink::new(&self.file_name, &self.bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub file_name: String,
    pub data_uri: String,
}

impl DownloadLink {
    pub fn new(file_name: &str, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.to_string(),
            data_uri: format!("data:application/octet-stream;base64,{}", STANDARD.encode(bytes)),
        }
    }

    pub fn to_anchor(&self) -> String {
        let name = escape_html(&self.file_name);
        format!(
            r#"<a href="{}" download="{}">Download {}</a>"#,
            self.data_uri, name, name
        )
    }
}

/// Serializes the document through a fresh scratch file and reads the bytes
/// back. The scratch file is gone once this returns.
pub fn serialize_document(document: &VisioDocument, scratch_dir: Option<&Path>) -> Result<Vec<u8>> {
    let scratch = ScratchFile::create(scratch_dir)?;
    document.save(scratch.path())?;
    scratch.read()
}

/// Output name: the original stem run through the translator, with the
/// `.vsdx` extension put back.
pub async fn translated_file_name<T: Translator>(
    translator: &T,
    original_name: &str,
    target_lang: &str,
) -> Result<String> {
    let (stem, extension) = split_extension(original_name);
    let translated = if stem.trim().is_empty() {
        stem.to_string()
    } else {
        translator.translate(stem, target_lang).await?
    };
    Ok(format!("{}{}", sanitize_file_name(&translated), extension))
}

/// Output name used when the name itself should not be translated.
pub fn tagged_file_name(original_name: &str, target_lang: &str) -> String {
    let (stem, extension) = split_extension(original_name);
    format!("{}.{}{}", sanitize_file_name(stem), target_lang, extension)
}

fn split_extension(name: &str) -> (&str, &str) {
    let len = SCRATCH_SUFFIX.len();
    if name.len() > len
        && name.is_char_boundary(name.len() - len)
        && name[name.len() - len..].eq_ignore_ascii_case(SCRATCH_SUFFIX)
    {
        name.split_at(name.len() - len)
    } else {
        (name, SCRATCH_SUFFIX)
    }
}
