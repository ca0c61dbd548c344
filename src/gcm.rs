//! Streaming AES-GCM contexts.
//!
//! Sessions hand ciphertext out fragment by fragment without knowing the
//! total length, which the one-shot AEAD interface cannot do. This module
//! builds GCM from the same pieces the `aes-gcm` crate composes internally:
//! an AES block cipher, a 32-bit big-endian CTR keystream, and GHASH.
//!
//! Construction per NIST SP 800-38D for 96-bit IVs:
//!
//! ```text
//! H  = E_K(0^128)
//! J0 = IV || 0x00000001
//! C  = CTR(K, inc32(J0), P)
//! T  = GHASH_H(C || len64(AAD) || len64(C)) xor E_K(J0)
//! ```
//!
//! No associated data is used by the frame format, so the AAD length is
//! always zero.

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes256};
use ctr::Ctr32BE;
use ghash::{universal_hash::UniversalHash, GHash};
use subtle::ConstantTimeEq;

use crate::error::Error;

/// Both registry algorithms use 96-bit IVs and 128-bit tags.
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

type Block = aes::Block;

enum Keystream {
    Aes128(Ctr32BE<Aes128>),
    Aes256(Ctr32BE<Aes256>),
}

impl Keystream {
    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.apply_keystream(buf),
            Self::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

/// One encryption or decryption in flight.
///
/// Ciphertext bytes are absorbed into GHASH as they are produced (encrypt)
/// or before the keystream is applied (decrypt); the tag comes out of
/// [`Self::finish`] or is checked by [`Self::verify`].
pub struct GcmStream {
    keystream: Keystream,
    ghash: GHash,
    tag_mask: Block,
    /// Ciphertext bytes waiting for a full GHASH block.
    pending: Block,
    pending_len: usize,
    ct_len: u64,
}

impl GcmStream {
    /// Key length selects AES-128 or AES-256; anything else is rejected.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, Error> {
        if iv.len() != IV_LEN {
            return Err(Error::Crypto("unsupported iv length"));
        }

        let mut j0 = Block::default();
        j0[..IV_LEN].copy_from_slice(iv);
        j0[15] = 1;

        let mut h = Block::default();
        let keystream = match key.len() {
            16 => {
                Aes128::new_from_slice(key)
                    .map_err(|_| Error::Crypto("cipher init failed"))?
                    .encrypt_block(&mut h);
                Keystream::Aes128(
                    Ctr32BE::new_from_slices(key, j0.as_slice())
                        .map_err(|_| Error::Crypto("cipher init failed"))?,
                )
            }
            32 => {
                Aes256::new_from_slice(key)
                    .map_err(|_| Error::Crypto("cipher init failed"))?
                    .encrypt_block(&mut h);
                Keystream::Aes256(
                    Ctr32BE::new_from_slices(key, j0.as_slice())
                        .map_err(|_| Error::Crypto("cipher init failed"))?,
                )
            }
            _ => return Err(Error::Crypto("unsupported key length")),
        };

        let mut stream = Self {
            keystream,
            ghash: GHash::new(&h),
            tag_mask: Block::default(),
            pending: Block::default(),
            pending_len: 0,
            ct_len: 0,
        };

        // The first keystream block is E_K(J0), reserved for the tag;
        // payload encryption starts at J0 + 1.
        let mut mask = Block::default();
        stream.keystream.apply(&mut mask);
        stream.tag_mask = mask;

        Ok(stream)
    }

    /// Encrypt one plaintext fragment. Output length equals input length.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut ct = plaintext.to_vec();
        self.keystream.apply(&mut ct);
        self.absorb(&ct);
        ct
    }

    /// Decrypt one ciphertext fragment (tag bytes excluded by the caller).
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        self.absorb(ciphertext);
        let mut pt = ciphertext.to_vec();
        self.keystream.apply(&mut pt);
        pt
    }

    /// Fold ciphertext into GHASH, carrying partial blocks between calls.
    fn absorb(&mut self, mut data: &[u8]) {
        self.ct_len += data.len() as u64;

        if self.pending_len > 0 {
            let take = (16 - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            if self.pending_len < 16 {
                return;
            }
            self.ghash.update(&[self.pending]);
            self.pending = Block::default();
            self.pending_len = 0;
        }

        let mut chunks = data.chunks_exact(16);
        for chunk in &mut chunks {
            self.ghash.update(&[*Block::from_slice(chunk)]);
        }

        let rest = chunks.remainder();
        if !rest.is_empty() {
            self.pending[..rest.len()].copy_from_slice(rest);
            self.pending_len = rest.len();
        }
    }

    fn tag(self) -> Block {
        let Self {
            mut ghash,
            tag_mask,
            pending,
            pending_len,
            ct_len,
            ..
        } = self;

        if pending_len > 0 {
            // the tail of `pending` past pending_len is still zero
            ghash.update(&[pending]);
        }

        let mut lengths = Block::default();
        lengths[..8].copy_from_slice(&0u64.to_be_bytes());
        lengths[8..].copy_from_slice(&(ct_len * 8).to_be_bytes());
        ghash.update(&[lengths]);

        let mut tag = ghash.finalize();
        for (t, m) in tag.as_mut_slice().iter_mut().zip(tag_mask.as_slice()) {
            *t ^= m;
        }
        tag
    }

    /// Finish an encryption, producing the authentication tag.
    pub fn finish(self) -> [u8; TAG_LEN] {
        self.tag().into()
    }

    /// Finish a decryption, verifying the received tag in constant time.
    pub fn verify(self, expected: &[u8]) -> Result<(), Error> {
        let tag = self.tag();
        if expected.len() == TAG_LEN && bool::from(tag.as_slice().ct_eq(expected)) {
            Ok(())
        } else {
            Err(Error::Crypto("authentication tag mismatch"))
        }
    }
}
