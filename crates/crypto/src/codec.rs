//! Encrypted-field codec.
//!
//! Token layout (before base64): `version (1) || nonce (12) || ciphertext + tag`.
//! A fresh random nonce is drawn per encryption, so encrypting the same
//! plaintext twice yields different tokens. Encrypted columns therefore cannot
//! be used for equality lookups; callers decrypt candidates and compare in
//! memory.

use std::sync::OnceLock;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use talentverify_core::SensitiveValue;

use crate::error::CodecError;
use crate::key::{self, KEY_LEN, KeySource};

const TOKEN_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Field codec holding a lazily resolved AES-256-GCM cipher.
///
/// The key is resolved on first use and cached, including a resolution
/// failure, so a misconfigured production deployment fails on its first
/// sensitive read or write rather than at construction. The codec is
/// `Send + Sync` and can be shared behind an `Arc`.
pub struct FieldCodec {
    source: KeySource,
    cipher: OnceLock<Result<Aes256Gcm, CodecError>>,
}

impl FieldCodec {
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            cipher: OnceLock::new(),
        }
    }

    /// Codec with a fixed key (tests, tooling).
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        let cipher = OnceLock::new();
        let _ = cipher.set(Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))));
        Self {
            source: KeySource::default(),
            cipher,
        }
    }

    /// Force key resolution now.
    pub fn ensure_ready(&self) -> Result<(), CodecError> {
        self.cipher().map(|_| ())
    }

    fn cipher(&self) -> Result<&Aes256Gcm, CodecError> {
        self.cipher
            .get_or_init(|| {
                let key = key::resolve(&self.source)?;
                Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice())))
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Encrypt one plaintext into a token.
    pub fn seal(&self, plaintext: &str) -> Result<String, CodecError> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encrypt)?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        raw.push(TOKEN_VERSION);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(raw))
    }

    /// Decrypt one token.
    ///
    /// Malformed, truncated, tampered or foreign-key tokens yield
    /// [`SensitiveValue::Undecryptable`]; only key configuration problems are
    /// returned as errors.
    pub fn open(&self, token: &str) -> Result<SensitiveValue, CodecError> {
        let cipher = self.cipher()?;
        match Self::decrypt(cipher, token) {
            Ok(plain) => Ok(SensitiveValue::Plain(plain)),
            Err(reason) => {
                tracing::debug!(reason, "sensitive field token could not be decrypted");
                Ok(SensitiveValue::Undecryptable(token.to_string()))
            }
        }
    }

    fn decrypt(cipher: &Aes256Gcm, token: &str) -> Result<String, &'static str> {
        let raw = STANDARD.decode(token.trim()).map_err(|_| "not base64")?;
        if raw.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err("truncated");
        }
        if raw[0] != TOKEN_VERSION {
            return Err("unknown token version");
        }

        let nonce = Nonce::from_slice(&raw[1..1 + NONCE_LEN]);
        let plain = cipher
            .decrypt(nonce, &raw[1 + NONCE_LEN..])
            .map_err(|_| "authentication failed")?;
        String::from_utf8(plain).map_err(|_| "not utf-8")
    }

    /// `None` stays `None`; absence is never encrypted.
    pub fn encode(&self, plaintext: Option<&str>) -> Result<Option<String>, CodecError> {
        plaintext.map(|p| self.seal(p)).transpose()
    }

    /// `None` stays `None`.
    pub fn decode(&self, token: Option<&str>) -> Result<Option<SensitiveValue>, CodecError> {
        token.map(|t| self.open(t)).transpose()
    }

    /// Encode a domain value for storage.
    ///
    /// An undecryptable value is written back as the token it was read from.
    pub fn encode_value(&self, value: &SensitiveValue) -> Result<String, CodecError> {
        match value {
            SensitiveValue::Plain(plain) => self.seal(plain),
            SensitiveValue::Undecryptable(token) => Ok(token.clone()),
        }
    }
}

impl core::fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match self.cipher.get() {
            None => "unresolved",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("FieldCodec")
            .field("source", &self.source)
            .field("key", &state)
            .finish()
    }
}
