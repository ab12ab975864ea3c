//! Upload, harvest, translate, package: one pass per file.

pub mod harvest;
pub mod intake;
pub mod output;
pub mod progress;

pub use harvest::{harvest, Harvest, HarvestedText};
pub use intake::{intake, ScratchFile, UploadedFile};
pub use output::{serialize_document, tagged_file_name, translated_file_name, DownloadLink, TranslatedFile};
pub use progress::{LogProgress, ProgressCounter, ProgressEvent, ProgressSink};

use crate::diagram::{VisioDocument, DEFAULT_UNPACKED_LIMIT};
use crate::translation::Translator;
use crate::utils::Result;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target_lang: String,
    pub scratch_dir: Option<PathBuf>,
    /// Run the file name through the translator too; otherwise the output is
    /// named `{stem}.{code}.vsdx`.
    pub translate_file_name: bool,
    /// Largest total size an upload may unpack to.
    pub max_unpacked_bytes: u64,
}

impl PipelineOptions {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            scratch_dir: None,
            translate_file_name: true,
            max_unpacked_bytes: DEFAULT_UNPACKED_LIMIT,
        }
    }
}

#[derive(Debug)]
pub struct BatchItem {
    pub name: String,
    pub result: Result<TranslatedFile>,
}

/// Second phase: rewrites every harvested shape in harvest order, one
/// request per shape. The first failure stops the pass; shapes already
/// rewritten stay rewritten in `document`.
pub async fn translate_document<T: Translator, S: ProgressSink>(
    translator: &T,
    document: &mut VisioDocument,
    harvest: &Harvest,
    target_lang: &str,
    file_name: &str,
    sink: &mut S,
) -> Result<ProgressCounter> {
    let mut counter = ProgressCounter::new(harvest.total_words);

    for item in &harvest.items {
        let translated = translator.translate(&item.text, target_lang).await?;
        document.set_shape_text(item.shape, &translated)?;

        let percent = counter.advance(item.words);
        sink.report(ProgressEvent::Progress {
            file: file_name.to_string(),
            percent,
        });
    }

    Ok(counter)
}

/// Runs one upload through intake, harvest, translation and packaging.
pub async fn translate_file<T: Translator, S: ProgressSink>(
    translator: &T,
    upload: &UploadedFile,
    options: &PipelineOptions,
    sink: &mut S,
) -> Result<TranslatedFile> {
    match run_file(translator, upload, options, sink).await {
        Ok(file) => Ok(file),
        Err(e) => {
            sink.report(ProgressEvent::Failed {
                file: upload.name.clone(),
                error: e.to_string(),
            });
            Err(e)
        }
    }
}

async fn run_file<T: Translator, S: ProgressSink>(
    translator: &T,
    upload: &UploadedFile,
    options: &PipelineOptions,
    sink: &mut S,
) -> Result<TranslatedFile> {
    let scratch_dir = options.scratch_dir.as_deref();
    let scratch = intake(upload, scratch_dir)?;
    let mut document = VisioDocument::open_limited(scratch.path(), options.max_unpacked_bytes)?;

    let harvest = harvest(&document);
    sink.report(ProgressEvent::Started {
        file: upload.name.clone(),
        total_words: harvest.total_words,
        target_lang: options.target_lang.clone(),
    });

    let mut counter = translate_document(
        translator,
        &mut document,
        &harvest,
        &options.target_lang,
        &upload.name,
        sink,
    )
    .await?;

    let bytes = serialize_document(&document, scratch_dir)?;
    let file_name = if options.translate_file_name {
        translated_file_name(translator, &upload.name, &options.target_lang).await?
    } else {
        tagged_file_name(&upload.name, &options.target_lang)
    };

    sink.report(ProgressEvent::Progress {
        file: upload.name.clone(),
        percent: counter.finish(),
    });
    sink.report(ProgressEvent::Completed {
        file: upload.name.clone(),
        output_name: file_name.clone(),
    });
    info!(
        file = %upload.name,
        output = %file_name,
        shapes = harvest.len(),
        words = counter.translated_words(),
        "Diagram translated"
    );

    Ok(TranslatedFile {
        original_name: upload.name.clone(),
        file_name,
        bytes,
        shapes_translated: harvest.len(),
        words_translated: counter.translated_words(),
    })
}

/// Translates uploads one after another. A failing file does not stop the
/// others, except for credential failures, which would fail every file.
pub async fn translate_batch<T: Translator, S: ProgressSink>(
    translator: &T,
    uploads: &[UploadedFile],
    options: &PipelineOptions,
    sink: &mut S,
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let result = translate_file(translator, upload, options, sink).await;
        let abort = matches!(&result, Err(e) if e.aborts_batch());
        items.push(BatchItem {
            name: upload.name.clone(),
            result,
        });
        if abort {
            warn!(
                remaining = uploads.len() - items.len(),
                "Credentials rejected, skipping remaining files"
            );
            break;
        }
    }

    items
}
