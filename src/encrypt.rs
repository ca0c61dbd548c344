//! Encryption sessions: a server-scoped bracket around a set of encryptions
//! sharing one bounded-use data key.
//!
//! The factory asks the service for a key with `uses` permitted encryptions,
//! unwraps it locally with the caller's RSA passphrase, and never sends the
//! raw key back over the wire. Each encryption is framed as
//! `header || ciphertext || tag` so that a peer holding the RSA private key
//! can decrypt from the frame alone.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::algorithm::{self, Algorithm};
use crate::credentials::Credentials;
use crate::error::Error;
use crate::gcm::GcmStream;
use crate::header;
use crate::transport::{Method, RestClient, Transport};

#[derive(Serialize)]
struct NewKeyRequest {
    uses: u32,
}

#[derive(Serialize)]
struct UsageReport {
    requested: u32,
    actual: u32,
}

#[derive(Deserialize)]
struct SecurityModel {
    algorithm: String,
    enable_data_fragmentation: bool,
}

#[derive(Deserialize)]
struct NewKeyResponse {
    encrypted_private_key: String,
    encryption_session: String,
    key_fingerprint: String,
    wrapped_data_key: String,
    encrypted_data_key: String,
    max_uses: u32,
    security_model: SecurityModel,
}

/// Decrypt the passphrase-protected private key and use it to recover the
/// raw data key from its base64 wrapped form.
pub(crate) fn unwrap_data_key(
    encrypted_private_key: &str,
    passphrase: &str,
    wrapped_data_key_b64: &str,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let private_key =
        RsaPrivateKey::from_pkcs8_encrypted_pem(encrypted_private_key, passphrase.as_bytes())
            .map_err(|_| Error::Crypto("private key decryption failed"))?;

    let wrapped = BASE64
        .decode(wrapped_data_key_b64)
        .map_err(|e| Error::Protocol(format!("wrapped data key: {}", e)))?;

    // the service wraps with OAEP under OpenSSL defaults, i.e. SHA-1
    let raw = private_key
        .decrypt(Oaep::new::<Sha1>(), &wrapped)
        .map_err(|_| Error::Crypto("data key unwrap failed"))?;

    Ok(Zeroizing::new(raw))
}

/// A stateful encryption session.
///
/// Between [`begin`](Self::begin) and [`end`](Self::end) the session holds a
/// live cipher context; outside that bracket it is idle and can begin again
/// until the key's use quota runs out. A session is not meant for concurrent
/// use — run independent sessions on independent threads instead.
pub struct Encryption {
    api_root: String,
    transport: Arc<dyn Transport>,
    session: String,
    fingerprint: String,
    raw_key: Zeroizing<Vec<u8>>,
    wrapped_key: Vec<u8>,
    algo: &'static Algorithm,
    max_uses: u32,
    used: u32,
    fragment: bool,
    ctx: Option<GcmStream>,
    reported: bool,
}

impl std::fmt::Debug for Encryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryption")
            .field("api_root", &self.api_root)
            .field("session", &self.session)
            .field("fingerprint", &self.fingerprint)
            .field("raw_key", &"<redacted>")
            .field("wrapped_key", &"<redacted>")
            .field("algo", &self.algo)
            .field("max_uses", &self.max_uses)
            .field("used", &self.used)
            .field("fragment", &self.fragment)
            .field("reported", &self.reported)
            .finish_non_exhaustive()
    }
}

impl Encryption {
    /// Request a data key good for `uses` encryptions and build a session
    /// around it.
    pub fn new(creds: &Credentials, uses: u32) -> Result<Self, Error> {
        Self::with_transport(creds, uses, RestClient::shared(creds)?)
    }

    /// Like [`new`](Self::new), with a caller-supplied transport.
    pub fn with_transport(
        creds: &Credentials,
        uses: u32,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let api_root = creds.api_root();
        let url = format!("{}/encryption/key", api_root);
        let body = serde_json::to_vec(&NewKeyRequest { uses })?;

        let resp = transport.request(Method::Post, &url, &body)?;
        if resp.status != 201 {
            return Err(Error::status("encryption key request rejected", resp.status));
        }

        let parsed: NewKeyResponse = serde_json::from_slice(&resp.body)?;

        let raw_key = unwrap_data_key(
            &parsed.encrypted_private_key,
            creds.secret_crypto_access_key(),
            &parsed.wrapped_data_key,
        )?;

        // kept separately from the unwrap input: this exact byte string is
        // what every header emitted by this session will carry
        let wrapped_key = BASE64
            .decode(&parsed.encrypted_data_key)
            .map_err(|e| Error::Protocol(format!("encrypted data key: {}", e)))?;

        let algo = algorithm::by_name(&parsed.security_model.algorithm).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown algorithm {:?} from server",
                parsed.security_model.algorithm
            ))
        })?;

        if raw_key.len() != algo.key_len {
            return Err(Error::Protocol(format!(
                "data key length {} does not match {}",
                raw_key.len(),
                algo.name
            )));
        }

        debug!(
            session = %parsed.encryption_session,
            fingerprint = %parsed.key_fingerprint,
            algorithm = algo.name,
            max_uses = parsed.max_uses,
            "encryption session created"
        );

        Ok(Self {
            api_root,
            transport,
            session: parsed.encryption_session,
            fingerprint: parsed.key_fingerprint,
            raw_key,
            wrapped_key,
            algo,
            max_uses: parsed.max_uses,
            used: 0,
            fragment: parsed.security_model.enable_data_fragmentation,
            ctx: None,
            reported: false,
        })
    }

    /// Start one encryption, consuming one key use.
    ///
    /// Returns the frame header; the caller emits it ahead of every
    /// [`update`](Self::update) output.
    pub fn begin(&mut self) -> Result<Vec<u8>, Error> {
        if self.ctx.is_some() {
            return Err(Error::State("encryption already in progress"));
        }
        if self.used >= self.max_uses {
            return Err(Error::QuotaExhausted);
        }

        let mut iv = vec![0u8; self.algo.iv_len];
        getrandom::getrandom(&mut iv).map_err(|_| Error::Crypto("random iv generation failed"))?;

        let hdr = header::encode(self.algo, &iv, &self.wrapped_key)?;
        self.ctx = Some(GcmStream::new(&self.raw_key, &iv)?);
        self.used += 1;

        Ok(hdr)
    }

    /// Encrypt one plaintext fragment. Fragments may be any size; outputs
    /// concatenate in call order.
    pub fn update(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        match self.ctx.as_mut() {
            Some(ctx) => Ok(ctx.encrypt(plaintext)),
            None => Err(Error::State("no encryption in progress")),
        }
    }

    /// Finish the current encryption, producing the trailing tag bytes.
    pub fn end(&mut self) -> Result<Vec<u8>, Error> {
        match self.ctx.take() {
            Some(ctx) => Ok(ctx.finish().to_vec()),
            None => Err(Error::State("no encryption in progress")),
        }
    }

    /// Tear the session down, reporting actual key usage to the service.
    ///
    /// Dropping the session performs the same report best-effort; `close`
    /// is the variant that lets the caller observe a failure.
    pub fn close(mut self) -> Result<(), Error> {
        self.report_usage()
    }

    /// Uses consumed so far.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Uses granted by the service.
    pub fn max_uses(&self) -> u32 {
        self.max_uses
    }

    /// Whether the service asked for fragmented data uploads. Informational;
    /// nothing in this client keys off it yet.
    pub fn data_fragmentation_enabled(&self) -> bool {
        self.fragment
    }

    fn report_usage(&mut self) -> Result<(), Error> {
        if self.reported {
            return Ok(());
        }
        self.reported = true;

        if self.used >= self.max_uses {
            return Ok(());
        }

        let url = format!(
            "{}/encryption/key/{}/{}",
            self.api_root, self.fingerprint, self.session
        );
        let body = serde_json::to_vec(&UsageReport {
            requested: self.max_uses,
            actual: self.used,
        })?;

        let resp = self.transport.request(Method::Patch, &url, &body)?;
        if resp.status != 204 {
            return Err(Error::status("usage report rejected", resp.status));
        }
        Ok(())
    }
}

impl Drop for Encryption {
    fn drop(&mut self) {
        if let Err(e) = self.report_usage() {
            warn!(error = %e, "usage report failed during session teardown");
        }
    }
}

/// Encrypt a single buffer: one session, one use, one frame.
pub fn encrypt(creds: &Credentials, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let mut session = Encryption::new(creds, 1)?;
    let mut out = session.begin()?;
    out.extend_from_slice(&session.update(plaintext)?);
    out.extend_from_slice(&session.end()?);
    session.close()?;
    Ok(out)
}
