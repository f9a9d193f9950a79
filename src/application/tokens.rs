//! Bearer token generation for `API_TOKEN`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_TOKEN_BYTES: usize = 48;
pub const MIN_TOKEN_BYTES: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token length must be at least {MIN_TOKEN_BYTES} bytes (got {0})")]
    TooShort(usize),
}

/// Bytes of a v4 UUID that carry the version and variant bits.
const UUID_FIXED_BYTES: [usize; 2] = [6, 8];

/// Produce `bytes` random bytes encoded as unpadded base64url.
///
/// Randomness comes from v4 UUIDs, which draw from the OS generator. Only the
/// 14 bytes of each UUID without version or variant bits are used.
pub fn generate_api_token(bytes: usize) -> Result<String, TokenError> {
    if bytes < MIN_TOKEN_BYTES {
        return Err(TokenError::TooShort(bytes));
    }

    let mut buffer = Vec::with_capacity(bytes + 16);
    while buffer.len() < bytes {
        let uuid = Uuid::new_v4();
        buffer.extend(
            uuid.as_bytes()
                .iter()
                .enumerate()
                .filter(|(index, _)| !UUID_FIXED_BYTES.contains(index))
                .map(|(_, byte)| *byte),
        );
    }
    buffer.truncate(bytes);

    Ok(URL_SAFE_NO_PAD.encode(buffer))
}
