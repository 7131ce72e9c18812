//! Sensitive attribute values (registration numbers, phones, emails, employee codes).
//!
//! Entities carry these as plain data. The storage mapping layer turns them
//! into opaque tokens on write and back on read; a token that can no longer be
//! decrypted comes back as [`SensitiveValue::Undecryptable`] instead of failing
//! the read.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value_object::ValueObject;

/// Text shown in place of a value whose stored token could not be decrypted.
pub const DECRYPTION_FAILED: &str = "[decryption failed]";

/// A sensitive string attribute as seen by the domain.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SensitiveValue {
    /// Successfully decrypted (or freshly supplied) plaintext.
    Plain(String),
    /// The stored token could not be decrypted.
    ///
    /// Holds the original token so that re-saving the owning entity does not
    /// overwrite the stored ciphertext.
    Undecryptable(String),
}

impl ValueObject for SensitiveValue {}

impl SensitiveValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    /// Plaintext, if the value is readable.
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain(v) => Some(v),
            Self::Undecryptable(_) => None,
        }
    }

    /// Trimmed plaintext for business-key comparisons.
    ///
    /// Undecryptable values never match any key.
    pub fn key(&self) -> Option<&str> {
        self.as_plain().map(str::trim)
    }

    pub fn is_undecryptable(&self) -> bool {
        matches!(self, Self::Undecryptable(_))
    }

    /// Plaintext, or [`DECRYPTION_FAILED`].
    pub fn display_text(&self) -> &str {
        match self {
            Self::Plain(v) => v,
            Self::Undecryptable(_) => DECRYPTION_FAILED,
        }
    }
}

impl From<&str> for SensitiveValue {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for SensitiveValue {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

// Plaintext stays out of logs and panic messages.
impl core::fmt::Debug for SensitiveValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("SensitiveValue::Plain(<redacted>)"),
            Self::Undecryptable(_) => f.write_str("SensitiveValue::Undecryptable"),
        }
    }
}

impl core::fmt::Display for SensitiveValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_text())
    }
}

impl Serialize for SensitiveValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_text())
    }
}

impl<'de> Deserialize<'de> for SensitiveValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Plain)
    }
}
