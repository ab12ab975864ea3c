pub mod diagram;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod translation;
pub mod utils;

pub use diagram::{ShapeRef, VisioDocument};
pub use pipeline::{
    translate_batch, translate_file, BatchItem, DownloadLink, PipelineOptions, TranslatedFile,
    UploadedFile,
};
pub use state::{AppState, CleanupManager, JobSnapshot, SessionState};
pub use translation::{find_language, GoogleTranslateClient, Translator, SUPPORTED_LANGUAGES};
pub use utils::{AppConfig, Result, VsdxTranslatorError};
