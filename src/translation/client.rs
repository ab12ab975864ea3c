use crate::translation::credentials::{ServiceAccountKey, ServiceAccountTokenSource, TokenProvider};
use crate::translation::Translator;
use crate::utils::{AppConfig, Result, VsdxTranslatorError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Google Cloud Translation (v2, "basic") client.
pub struct GoogleTranslateClient {
    client: Client,
    endpoint: String,
    source_lang: Option<String>,
    auth: TokenProvider,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: [&'a str; 1],
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslationsData,
}

#[derive(Debug, Deserialize)]
struct TranslationsData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GoogleTranslateClient {
    pub fn from_service_account(key: ServiceAccountKey, config: &AppConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        let source = ServiceAccountTokenSource::new(client.clone(), key, config.api.scope.clone())?;
        info!(account = %source.client_email(), "Translation client authenticated with service account");
        Ok(Self::new(client, TokenProvider::ServiceAccount(source), config))
    }

    pub fn from_credentials_json(bytes: &[u8], config: &AppConfig) -> Result<Self> {
        Self::from_service_account(ServiceAccountKey::from_json(bytes)?, config)
    }

    pub fn from_credentials_file(path: &Path, config: &AppConfig) -> Result<Self> {
        Self::from_service_account(ServiceAccountKey::from_file(path)?, config)
    }

    pub fn with_access_token(token: impl Into<String>, config: &AppConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self::new(client, TokenProvider::Static(token.into()), config))
    }

    fn new(client: Client, auth: TokenProvider, config: &AppConfig) -> Self {
        Self {
            client,
            endpoint: config.api.endpoint.clone(),
            source_lang: config.translation.source_lang.clone(),
            auth,
        }
    }

    /// The service account e-mail, when authenticated with a key file.
    pub fn account(&self) -> Option<&str> {
        self.auth.account()
    }

    async fn call_api(&self, text: &str, target_lang: &str) -> Result<String> {
        let token = self.auth.bearer_token().await?;
        let request = TranslateRequest {
            q: [text],
            target: target_lang,
            format: "text",
            source: self.source_lang.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(VsdxTranslatorError::ApiError(format!(
                "API returned {}: {}",
                status, message
            )));
        }

        let api_response: TranslateResponse = response.json().await?;
        let translation = api_response
            .data
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| VsdxTranslatorError::ApiError("No translation in response".to_string()))?;

        debug!(
            target_lang,
            detected = translation.detected_source_language.as_deref().unwrap_or("-"),
            chars = text.len(),
            "Translated text"
        );
        Ok(translation.translated_text)
    }
}

impl Translator for GoogleTranslateClient {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        self.call_api(text, target_lang).await
    }
}

fn build_http_client(config: &AppConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_seconds))
        .build()?)
}
