pub mod client;
pub mod credentials;
pub mod languages;
#[cfg(test)]
pub(crate) mod testing;

pub use client::GoogleTranslateClient;
pub use credentials::{ServiceAccountKey, ServiceAccountTokenSource, TokenProvider};
pub use languages::{find_language, language_name, Language, SUPPORTED_LANGUAGES};

use crate::utils::{AppConfig, Result, VsdxTranslatorError};
use std::future::Future;
use std::sync::Arc;

/// A text translation service: one string in, one string out.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, target_lang: &str)
        -> impl Future<Output = Result<String>> + Send;
}

impl<T: Translator> Translator for Arc<T> {
    fn translate(
        &self,
        text: &str,
        target_lang: &str,
    ) -> impl Future<Output = Result<String>> + Send {
        T::translate(self, text, target_lang)
    }
}

/// Builds the client from whatever credentials the process was started with:
/// the configured path first, then `GOOGLE_APPLICATION_CREDENTIALS`.
/// `Ok(None)` means none were given and the user has to upload a key.
pub fn client_from_environment(config: &AppConfig) -> Result<Option<GoogleTranslateClient>> {
    match config.credentials_path() {
        Some(path) => {
            if !path.exists() {
                return Err(VsdxTranslatorError::CredentialsError(format!(
                    "credentials file {} does not exist",
                    path.display()
                )));
            }
            GoogleTranslateClient::from_credentials_file(&path, config).map(Some)
        }
        None => Ok(None),
    }
}
