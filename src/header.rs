//! Frame header codec (v0)
//!
//! Every ciphertext frame starts with a self-describing preamble:
//!
//! ```text
//! version[1] || flags[1] || algorithm_id[1] || iv_len[1] || key_len[2 BE]
//! || iv[iv_len] || wrapped_key[key_len]
//! ```
//!
//! The wrapped data key rides inside the header so a peer holding the
//! customer's RSA private key can recover the data key from the frame alone.

use crate::algorithm::{self, Algorithm};
use crate::error::Error;

/// Version byte for v0.
pub const VERSION: u8 = 0;

/// Flags byte (must be zero in v0).
pub const FLAGS_V0: u8 = 0;

/// Fixed-size portion: version + flags + algorithm id + iv len + key len(u16).
pub const FIXED_LEN: usize = 1 + 1 + 1 + 1 + 2; // 6

/// Borrowed view of a parsed header.
#[derive(Debug, Clone, Copy)]
pub struct Header<'a> {
    pub algorithm: &'static Algorithm,
    pub iv: &'a [u8],
    pub wrapped_key: &'a [u8],
}

/// Encode a header from its parts.
pub fn encode(algo: &Algorithm, iv: &[u8], wrapped_key: &[u8]) -> Result<Vec<u8>, Error> {
    if iv.len() != algo.iv_len {
        return Err(Error::InvalidArgument(format!(
            "iv length {} does not match algorithm ({})",
            iv.len(),
            algo.iv_len
        )));
    }
    if wrapped_key.is_empty() || wrapped_key.len() > usize::from(u16::MAX) {
        return Err(Error::InvalidArgument(format!(
            "wrapped key length {} out of range",
            wrapped_key.len()
        )));
    }

    let mut out = Vec::with_capacity(FIXED_LEN + iv.len() + wrapped_key.len());
    out.push(VERSION);
    out.push(FLAGS_V0);
    out.push(algo.id);
    out.push(iv.len() as u8);
    out.extend_from_slice(&(wrapped_key.len() as u16).to_be_bytes());
    out.extend_from_slice(iv);
    out.extend_from_slice(wrapped_key);

    Ok(out)
}

/// Decode a header from the front of `data`.
///
/// Returns `Ok(None)` when `data` is a valid prefix that simply does not yet
/// contain the whole header, so streaming callers can accumulate and retry.
/// On success the second element is the number of bytes consumed.
pub fn decode(data: &[u8]) -> Result<Option<(Header<'_>, usize)>, Error> {
    if data.len() < FIXED_LEN {
        return Ok(None);
    }

    if data[0] != VERSION {
        return Err(Error::Protocol(format!(
            "unsupported header version {}",
            data[0]
        )));
    }
    if data[1] != FLAGS_V0 {
        return Err(Error::Protocol(format!(
            "nonzero reserved flags {:#04x}",
            data[1]
        )));
    }

    let algo = algorithm::by_id(data[2])
        .ok_or_else(|| Error::Protocol(format!("unknown algorithm id {}", data[2])))?;

    let iv_len = usize::from(data[3]);
    if iv_len != algo.iv_len {
        return Err(Error::Protocol(format!(
            "iv length {} does not match algorithm {} ({})",
            iv_len, algo.name, algo.iv_len
        )));
    }

    let key_len = usize::from(u16::from_be_bytes([data[4], data[5]]));
    let total = FIXED_LEN + iv_len + key_len;
    if data.len() < total {
        return Ok(None);
    }

    let iv = &data[FIXED_LEN..FIXED_LEN + iv_len];
    let wrapped_key = &data[FIXED_LEN + iv_len..total];

    Ok(Some((
        Header {
            algorithm: algo,
            iv,
            wrapped_key,
        },
        total,
    )))
}
