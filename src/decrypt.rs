//! Decryption sessions: the frame pipeline in reverse.
//!
//! A decryptor accumulates bytes until the header parses, recovers the data
//! key — from the process-wide unwrap cache when possible, otherwise through
//! the service — then streams the body through the cipher while always
//! withholding the trailing tag bytes, which are verified at `end`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::algorithm::Algorithm;
use crate::cache::TtlCache;
use crate::credentials::Credentials;
use crate::encrypt::unwrap_data_key;
use crate::error::Error;
use crate::gcm::GcmStream;
use crate::header;
use crate::transport::{Method, RestClient, Transport};

/// How long an unwrapped key may be reused before the service is asked again.
const KEY_CACHE_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// An unwrap result shared across sessions. Raw key zeroizes on drop.
struct UnwrappedKey {
    raw: Zeroizing<Vec<u8>>,
    session: Option<String>,
    fingerprint: Option<String>,
}

fn key_cache() -> &'static TtlCache<UnwrappedKey> {
    static CACHE: OnceLock<TtlCache<UnwrappedKey>> = OnceLock::new();
    CACHE.get_or_init(TtlCache::new)
}

#[derive(Serialize)]
struct UnwrapRequest<'a> {
    encrypted_data_key: &'a str,
}

#[derive(Deserialize)]
struct UnwrapResponse {
    encrypted_private_key: String,
    wrapped_data_key: String,
    #[serde(default)]
    encryption_session: Option<String>,
    #[serde(default)]
    key_fingerprint: Option<String>,
}

#[derive(Serialize)]
struct DecryptReport {
    uses: u32,
}

/// A stateful decryption session.
///
/// Frames may be fed in fragments of any size. Creation is local; the
/// service is contacted only when a frame's wrapped key is not already in
/// the unwrap cache.
pub struct Decryption {
    api_root: String,
    access_key_id: String,
    passphrase: Zeroizing<String>,
    transport: Arc<dyn Transport>,
    key: Option<Arc<UnwrappedKey>>,
    cache_key: Option<String>,
    algo: Option<&'static Algorithm>,
    buf: Vec<u8>,
    ctx: Option<GcmStream>,
    in_frame: bool,
    uses: u32,
    reported: bool,
}

impl Decryption {
    pub fn new(creds: &Credentials) -> Result<Self, Error> {
        Ok(Self::with_transport(creds, RestClient::shared(creds)?))
    }

    /// Like [`new`](Self::new), with a caller-supplied transport.
    pub fn with_transport(creds: &Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            api_root: creds.api_root(),
            access_key_id: creds.access_key_id().to_owned(),
            passphrase: Zeroizing::new(creds.secret_crypto_access_key().to_owned()),
            transport,
            key: None,
            cache_key: None,
            algo: None,
            buf: Vec::new(),
            ctx: None,
            in_frame: false,
            uses: 0,
            reported: false,
        }
    }

    /// Start decrypting one frame.
    pub fn begin(&mut self) -> Result<(), Error> {
        if self.in_frame {
            return Err(Error::State("decryption already in progress"));
        }
        self.in_frame = true;
        self.buf.clear();
        Ok(())
    }

    /// Feed one ciphertext fragment, returning whatever plaintext can be
    /// released so far.
    ///
    /// Nothing comes out until the header has fully arrived; after that,
    /// output trails input by the tag length, since the last bytes of a
    /// frame are the tag rather than ciphertext.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        if !self.in_frame {
            return Err(Error::State("no decryption in progress"));
        }
        self.buf.extend_from_slice(data);

        if self.ctx.is_none() {
            let (iv, wrapped_b64, algo, consumed) = match header::decode(&self.buf)? {
                None => return Ok(Vec::new()),
                Some((hdr, consumed)) => (
                    hdr.iv.to_vec(),
                    BASE64.encode(hdr.wrapped_key),
                    hdr.algorithm,
                    consumed,
                ),
            };

            let key = self.resolve_key(&wrapped_b64, algo)?;
            self.ctx = Some(GcmStream::new(&key.raw, &iv)?);
            self.key = Some(key);
            self.algo = Some(algo);
            self.uses += 1;
            self.buf.drain(..consumed);
        }

        let (ctx, algo) = match (self.ctx.as_mut(), self.algo) {
            (Some(ctx), Some(algo)) => (ctx, algo),
            _ => return Err(Error::State("no decryption in progress")),
        };
        if self.buf.len() <= algo.tag_len {
            return Ok(Vec::new());
        }

        let release = self.buf.len() - algo.tag_len;
        let plaintext = ctx.decrypt(&self.buf[..release]);
        self.buf.drain(..release);
        Ok(plaintext)
    }

    /// Finish the current frame, verifying its authentication tag.
    pub fn end(&mut self) -> Result<Vec<u8>, Error> {
        if !self.in_frame {
            return Err(Error::State("no decryption in progress"));
        }
        self.in_frame = false;

        let ctx = self
            .ctx
            .take()
            .ok_or_else(|| Error::Protocol("truncated frame: incomplete header".into()))?;

        let tag = std::mem::take(&mut self.buf);
        let tag_len = self
            .algo
            .ok_or(Error::State("no decryption in progress"))?
            .tag_len;
        if tag.len() != tag_len {
            return Err(Error::Protocol("truncated frame: missing tag".into()));
        }

        ctx.verify(&tag)?;
        Ok(Vec::new())
    }

    /// Tear the session down, reporting how many frames were decrypted.
    ///
    /// Dropping the session performs the same report best-effort.
    pub fn close(mut self) -> Result<(), Error> {
        self.report_usage()
    }

    fn resolve_key(
        &mut self,
        wrapped_b64: &str,
        algo: &'static Algorithm,
    ) -> Result<Arc<UnwrappedKey>, Error> {
        let cache_key = format!("{}:{}", self.access_key_id, wrapped_b64);

        // same key as the previous frame: nothing to do
        if self.cache_key.as_deref() == Some(cache_key.as_str()) {
            if let Some(key) = &self.key {
                return Ok(Arc::clone(key));
            }
        }

        // a different key ends the accounting bracket for the previous one
        if self.key.is_some() {
            if let Err(e) = self.report_usage() {
                warn!(error = %e, "usage report failed on key change");
            }
            self.uses = 0;
            self.reported = false;
        }

        if let Some(key) = key_cache().get(&cache_key) {
            debug!("data key served from unwrap cache");
            self.cache_key = Some(cache_key);
            return Ok(key);
        }

        let url = format!("{}/decryption/key", self.api_root);
        let body = serde_json::to_vec(&UnwrapRequest {
            encrypted_data_key: wrapped_b64,
        })?;
        let resp = self.transport.request(Method::Post, &url, &body)?;
        if resp.status != 200 {
            return Err(Error::status("decryption key request rejected", resp.status));
        }
        let parsed: UnwrapResponse = serde_json::from_slice(&resp.body)?;

        let raw = unwrap_data_key(
            &parsed.encrypted_private_key,
            &self.passphrase,
            &parsed.wrapped_data_key,
        )?;
        if raw.len() != algo.key_len {
            return Err(Error::Protocol(format!(
                "data key length {} does not match {}",
                raw.len(),
                algo.name
            )));
        }

        let key = key_cache().insert(
            &cache_key,
            KEY_CACHE_TTL,
            UnwrappedKey {
                raw,
                session: parsed.encryption_session,
                fingerprint: parsed.key_fingerprint,
            },
        );
        self.cache_key = Some(cache_key);
        Ok(key)
    }

    fn report_usage(&mut self) -> Result<(), Error> {
        if self.reported {
            return Ok(());
        }
        self.reported = true;

        if self.uses == 0 {
            return Ok(());
        }
        let (fingerprint, session) = match self.key.as_deref() {
            Some(UnwrappedKey {
                fingerprint: Some(f),
                session: Some(s),
                ..
            }) => (f.clone(), s.clone()),
            _ => return Ok(()),
        };

        let url = format!(
            "{}/decryption/key/{}/{}",
            self.api_root, fingerprint, session
        );
        let body = serde_json::to_vec(&DecryptReport { uses: self.uses })?;

        let resp = self.transport.request(Method::Patch, &url, &body)?;
        if resp.status != 204 {
            return Err(Error::status("usage report rejected", resp.status));
        }
        Ok(())
    }
}

impl Drop for Decryption {
    fn drop(&mut self) {
        if let Err(e) = self.report_usage() {
            warn!(error = %e, "usage report failed during session teardown");
        }
    }
}

/// Decrypt a single self-describing frame.
pub fn decrypt(creds: &Credentials, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let mut session = Decryption::new(creds)?;
    let mut out = Vec::with_capacity(ciphertext.len());
    session.begin()?;
    out.extend_from_slice(&session.update(ciphertext)?);
    out.extend_from_slice(&session.end()?);
    session.close()?;
    Ok(out)
}
