//! Key material resolution.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CodecError;

/// Length of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 rounds used when deriving a key from the application secret.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const DERIVATION_SALT: &[u8] = b"talentverify.field-encryption.v1";

/// Deployment mode, as far as key handling cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl core::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" | "local" | "test" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Where the codec gets its key from.
#[derive(Clone, Default)]
pub struct KeySource {
    /// Base64 (standard or URL-safe) encoding of a 32-byte key.
    pub external_key: Option<String>,
    /// Long-lived application secret, used for derivation outside production.
    pub app_secret: Option<String>,
    pub environment: Environment,
}

impl KeySource {
    pub fn external(key: impl Into<String>) -> Self {
        Self {
            external_key: Some(key.into()),
            app_secret: None,
            environment: Environment::Production,
        }
    }

    pub fn derived(app_secret: impl Into<String>) -> Self {
        Self {
            external_key: None,
            app_secret: Some(app_secret.into()),
            environment: Environment::Development,
        }
    }
}

impl core::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeySource")
            .field("external_key", &self.external_key.as_ref().map(|_| "<set>"))
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<set>"))
            .field("environment", &self.environment)
            .finish()
    }
}

/// Resolve key bytes: external key first, then (outside production) derivation.
pub(crate) fn resolve(source: &KeySource) -> Result<Zeroizing<[u8; KEY_LEN]>, CodecError> {
    let external = source
        .external_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    if let Some(encoded) = external {
        return parse_external(encoded);
    }

    match source.environment {
        Environment::Production => Err(CodecError::MissingKey),
        Environment::Development => {
            let secret = source
                .app_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or(CodecError::MissingSecret)?;
            tracing::warn!("deriving field encryption key from the application secret; set FIELD_ENCRYPTION_KEY outside development");
            Ok(derive(secret))
        }
    }
}

pub(crate) fn parse_external(encoded: &str) -> Result<Zeroizing<[u8; KEY_LEN]>, CodecError> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .map_err(|e| CodecError::InvalidKey(format!("not base64: {e}")))?,
    );

    if bytes.len() != KEY_LEN {
        return Err(CodecError::InvalidKey(format!(
            "expected {KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

pub(crate) fn derive(secret: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        secret.as_bytes(),
        DERIVATION_SALT,
        PBKDF2_ITERATIONS,
        key.as_mut_slice(),
    );
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_key_wins_over_secret() {
        let encoded = STANDARD.encode([7u8; KEY_LEN]);
        let source = KeySource {
            external_key: Some(encoded),
            app_secret: Some("secret".to_string()),
            environment: Environment::Development,
        };
        assert_eq!(*resolve(&source).unwrap(), [7u8; KEY_LEN]);
    }

    #[test]
    fn url_safe_keys_are_accepted() {
        let encoded = URL_SAFE.encode([0xfbu8; KEY_LEN]);
        assert_eq!(*parse_external(&encoded).unwrap(), [0xfbu8; KEY_LEN]);
    }

    #[test]
    fn production_without_external_key_is_fatal() {
        let source = KeySource {
            external_key: None,
            app_secret: Some("secret".to_string()),
            environment: Environment::Production,
        };
        assert_eq!(resolve(&source).unwrap_err(), CodecError::MissingKey);
    }

    #[test]
    fn development_without_secret_is_fatal() {
        let source = KeySource::default();
        assert_eq!(resolve(&source).unwrap_err(), CodecError::MissingSecret);
    }

    #[test]
    fn wrong_length_key_is_rejected() {
        let encoded = STANDARD.encode([1u8; 16]);
        match parse_external(&encoded) {
            Err(CodecError::InvalidKey(msg)) => assert!(msg.contains("16")),
            other => panic!("expected InvalidKey, got {other:?}"),
        }
    }

    #[test]
    fn derivation_is_deterministic_per_secret() {
        let a = derive("django-insecure-secret");
        let b = derive("django-insecure-secret");
        let c = derive("another-secret");
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn environment_parses_common_spellings() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("development".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn debug_output_hides_key_material() {
        let source = KeySource::external("c2VjcmV0");
        let rendered = format!("{source:?}");
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(rendered.contains("<set>"));
    }
}
