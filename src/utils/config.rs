use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub translation: TranslationDefaults,
    pub credentials: CredentialsConfig,
    pub intake: IntakeConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub bind_addr: String,
    pub port: u16,
    pub max_upload_mb: usize,
    pub refresh_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub scope: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationDefaults {
    pub default_target_lang: String,
    /// Left unset, the service detects the source language per request.
    pub source_lang: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub scratch_dir: Option<PathBuf>,
    /// Cap on the total unpacked size of one uploaded diagram.
    pub max_unpacked_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub session_ttl_minutes: u64,
    pub cleanup_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "vsdx-translator".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_mb: 200,
            refresh_seconds: 2,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translation.googleapis.com/language/translate/v2".to_string(),
            scope: "https://www.googleapis.com/auth/cloud-translation".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl Default for TranslationDefaults {
    fn default() -> Self {
        Self {
            default_target_lang: "es".to_string(),
            source_lang: None,
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_unpacked_mb: 1024,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 60,
            cleanup_interval_minutes: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &str) -> crate::utils::errors::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::utils::errors::VsdxTranslatorError::ConfigError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::utils::errors::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::utils::errors::VsdxTranslatorError::ConfigError(e.to_string()))
    }

    pub fn load_or_default(path: Option<&str>) -> Self {
        if let Some(p) = path {
            match Self::load_from_file(p) {
                Ok(config) => config,
                Err(e) => {
                    tracing::debug!(path = p, error = %e, "Using default configuration");
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Credential path from the config file, else from the environment.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.credentials_path_with(std::env::var_os(CREDENTIALS_ENV_VAR).map(PathBuf::from))
    }

    fn credentials_path_with(&self, env_value: Option<PathBuf>) -> Option<PathBuf> {
        self.credentials
            .path
            .clone()
            .or(env_value)
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb * 1024 * 1024
    }

    pub fn max_unpacked_bytes(&self) -> u64 {
        self.intake.max_unpacked_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [translation]
            default_target_lang = "fr"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "127.0.0.1");
        assert_eq!(config.translation.default_target_lang, "fr");
        assert_eq!(
            config.api.endpoint,
            "https://translation.googleapis.com/language/translate/v2"
        );
        assert_eq!(config.cleanup.session_ttl_minutes, 60);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let err = AppConfig::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(
            err,
            crate::utils::errors::VsdxTranslatorError::ConfigError(_)
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default(Some("/nonexistent/config.toml"));
        assert_eq!(config.server.name, "vsdx-translator");
    }

    #[test]
    fn configured_credentials_take_precedence_over_environment() {
        let mut config = AppConfig::default();
        let env = Some(PathBuf::from("/env/key.json"));

        assert_eq!(
            config.credentials_path_with(env.clone()),
            Some(PathBuf::from("/env/key.json"))
        );

        config.credentials.path = Some(PathBuf::from("/config/key.json"));
        assert_eq!(
            config.credentials_path_with(env),
            Some(PathBuf::from("/config/key.json"))
        );
    }

    #[test]
    fn empty_environment_value_means_no_credentials() {
        let config = AppConfig::default();
        assert_eq!(config.credentials_path_with(Some(PathBuf::new())), None);
        assert_eq!(config.credentials_path_with(None), None);
    }
}
