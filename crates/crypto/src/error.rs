use thiserror::Error;

/// Codec failures that callers must see.
///
/// Corrupt ciphertext is *not* one of them: it decodes to
/// `SensitiveValue::Undecryptable`. These errors are configuration problems,
/// surfaced the first time the codec is used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("no field encryption key configured (required in production)")]
    MissingKey,

    #[error("no application secret available to derive a field encryption key")]
    MissingSecret,

    #[error("invalid field encryption key: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encrypt,
}
