//! `talentverify-crypto`: field-level encryption for sensitive directory data.
//!
//! [`FieldCodec`] turns plaintext into opaque, text-safe tokens and back. It is
//! constructed explicitly and handed to whatever layer maps entities to
//! storage; nothing here is process-global.

pub mod codec;
pub mod error;
pub mod key;

pub use codec::FieldCodec;
pub use error::CodecError;
pub use key::{Environment, KeySource, PBKDF2_ITERATIONS};
