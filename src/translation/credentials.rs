use crate::utils::{Result, VsdxTranslatorError};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// A Google Cloud service-account key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let key: Self = serde_json::from_slice(bytes).map_err(|e| {
            VsdxTranslatorError::CredentialsError(format!("malformed service account JSON: {}", e))
        })?;

        if key.key_type != "service_account" {
            return Err(VsdxTranslatorError::CredentialsError(format!(
                "expected a service_account key, got '{}'",
                key.key_type
            )));
        }
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(VsdxTranslatorError::CredentialsError(
                "service account key lacks client_email or private_key".to_string(),
            ));
        }

        Ok(key)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            VsdxTranslatorError::CredentialsError(format!(
                "cannot read credentials {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&bytes)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Exchanges a signed JWT for OAuth2 access tokens and caches them until
/// shortly before they expire.
pub struct ServiceAccountTokenSource {
    http: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountTokenSource {
    /// Fails right away on a private key that is not RSA PEM.
    pub fn new(http: Client, key: ServiceAccountKey, scope: impl Into<String>) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            VsdxTranslatorError::CredentialsError(format!("invalid private key: {}", e))
        })?;

        Ok(Self {
            http,
            key,
            encoding_key,
            scope: scope.into(),
            cached: Arc::new(RwLock::new(None)),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() + REFRESH_MARGIN {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn signed_assertion(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let assertion = self.signed_assertion()?;
        debug!(token_uri = %self.key.token_uri, "Requesting access token");

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| VsdxTranslatorError::AuthError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VsdxTranslatorError::AuthError(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| VsdxTranslatorError::AuthError(e.to_string()))?;

        let lifetime = token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        info!(
            account = %self.key.client_email,
            expires_in = lifetime,
            "Obtained access token"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}

/// Where bearer tokens for the translation API come from.
pub enum TokenProvider {
    ServiceAccount(ServiceAccountTokenSource),
    /// A token obtained elsewhere, e.g. `gcloud auth print-access-token`.
    Static(String),
}

impl TokenProvider {
    pub async fn bearer_token(&self) -> Result<String> {
        match self {
            TokenProvider::ServiceAccount(source) => source.access_token().await,
            TokenProvider::Static(token) => Ok(token.clone()),
        }
    }

    pub fn account(&self) -> Option<&str> {
        match self {
            TokenProvider::ServiceAccount(source) => Some(source.client_email()),
            TokenProvider::Static(_) => None,
        }
    }
}
