//! Process configuration read from the environment.

use talentverify_crypto::{Environment, KeySource};

/// Upload size limit used when `TALENTVERIFY_MAX_UPLOAD_BYTES` is unset.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const DEV_SECRET: &str = "talentverify-insecure-dev-secret";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// Base64 encoding of the 32-byte field encryption key.
    pub field_encryption_key: Option<String>,
    /// Application secret; only used to derive a key outside production.
    pub secret_key: Option<String>,
    pub database_url: Option<String>,
    pub max_upload_bytes: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("TALENTVERIFY_ENV") {
            Some(raw) => raw.parse::<Environment>().map_err(|message| ConfigError::Invalid {
                var: "TALENTVERIFY_ENV",
                message,
            })?,
            None => Environment::Development,
        };

        let secret_key = match (get("SECRET_KEY"), environment) {
            (Some(secret), _) => Some(secret),
            (None, Environment::Development) => {
                tracing::warn!("SECRET_KEY not set; using insecure dev default");
                Some(DEV_SECRET.to_string())
            }
            (None, Environment::Production) => None,
        };

        let max_upload_bytes = match get("TALENTVERIFY_MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "TALENTVERIFY_MAX_UPLOAD_BYTES",
                message: e.to_string(),
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            environment,
            field_encryption_key: get("FIELD_ENCRYPTION_KEY"),
            secret_key,
            database_url: get("DATABASE_URL"),
            max_upload_bytes,
        })
    }

    /// Key source for the field codec. Resolution (and any failure) happens on
    /// first codec use.
    pub fn key_source(&self) -> KeySource {
        KeySource {
            external_key: self.field_encryption_key.clone(),
            app_secret: self.secret_key.clone(),
            environment: self.environment,
        }
    }
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("field_encryption_key", &self.field_encryption_key.as_ref().map(|_| "<set>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<set>"))
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_to_development_with_dev_secret() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.secret_key.as_deref(), Some(DEV_SECRET));
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn production_gets_no_default_secret() {
        let cfg = config(&[("TALENTVERIFY_ENV", "production")]).unwrap();
        assert_eq!(cfg.secret_key, None);
        let source = cfg.key_source();
        assert_eq!(source.environment, Environment::Production);
        assert!(source.external_key.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("FIELD_ENCRYPTION_KEY", "   "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(cfg.field_encryption_key, None);
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn bad_upload_limit_is_reported() {
        match config(&[("TALENTVERIFY_MAX_UPLOAD_BYTES", "ten megs")]) {
            Err(ConfigError::Invalid { var, .. }) => assert_eq!(var, "TALENTVERIFY_MAX_UPLOAD_BYTES"),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn debug_hides_secrets() {
        let cfg = config(&[("SECRET_KEY", "hunter2"), ("DATABASE_URL", "postgres://u:p@h/db")]).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("postgres://"));
    }
}
