//! Token wire format.
//!
//! A token is the base64url (no padding) encoding of a JSON claims object.
//! The codec only checks the protocol `version`; it knows nothing about
//! token types, fingerprints or expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current approval token protocol version.
pub const TOKEN_VERSION: u32 = 1;

/// Errors from encoding or decoding a token.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("token is empty")]
    Empty,

    #[error("token is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("unsupported token version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Encode claims into an opaque token.
pub fn encode<T: Serialize>(claims: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(claims)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a token into claims, rejecting other protocol versions.
///
/// Surrounding whitespace (from copy/paste) is ignored.
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, CodecError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CodecError::Empty);
    }

    let bytes = URL_SAFE_NO_PAD.decode(token)?;
    let probe: VersionProbe = serde_json::from_slice(&bytes)?;
    if probe.version != TOKEN_VERSION {
        return Err(CodecError::Version {
            found: probe.version,
            expected: TOKEN_VERSION,
        });
    }
    Ok(serde_json::from_slice(&bytes)?)
}
