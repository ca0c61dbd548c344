//! REST transport with HTTP-signature authentication.
//!
//! Sessions talk to the service through the [`Transport`] trait; the
//! blocking [`RestClient`] is the production implementation, and tests
//! substitute their own. Every operation is synchronous — callers wanting
//! parallelism run independent sessions on their own threads.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use tracing::debug;
use zeroize::Zeroizing;

use crate::credentials::Credentials;
use crate::error::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SIGNED_HEADERS: &str =
    "(created) (request-target) content-length content-type date digest host";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Patch,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

/// What came back from the service.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The wire seam between sessions and the service.
///
/// Bodies are always `application/json`.
pub trait Transport: Send + Sync {
    fn request(&self, method: Method, url: &str, body: &[u8]) -> Result<Response, Error>;
}

/// Blocking HTTP client that signs each request with the caller's secret
/// signing key.
pub struct RestClient {
    client: reqwest::blocking::Client,
    access_key_id: String,
    secret_signing_key: Zeroizing<String>,
}

impl RestClient {
    pub fn new(creds: &Credentials) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            access_key_id: creds.access_key_id().to_owned(),
            secret_signing_key: Zeroizing::new(creds.secret_signing_key().to_owned()),
        })
    }

    pub fn shared(creds: &Credentials) -> Result<Arc<dyn Transport>, Error> {
        Ok(Arc::new(Self::new(creds)?))
    }
}

impl Transport for RestClient {
    fn request(&self, method: Method, url: &str, body: &[u8]) -> Result<Response, Error> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("url {}: {}", url, e)))?;

        let host = match parsed.port() {
            Some(port) => format!("{}:{}", parsed.host_str().unwrap_or(""), port),
            None => parsed.host_str().unwrap_or("").to_owned(),
        };
        let target = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_owned(),
        };

        let created = Utc::now().timestamp();
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let digest = format!("SHA-512={}", BASE64.encode(Sha512::digest(body)));

        let signing_string = signing_string(
            created,
            method,
            &target,
            body.len(),
            &date,
            &digest,
            &host,
        );

        let mut mac = Hmac::<Sha512>::new_from_slice(self.secret_signing_key.as_bytes())
            .map_err(|_| Error::Transport {
                detail: "request signing failed".into(),
                status: None,
            })?;
        mac.update(signing_string.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let signature_header = format!(
            "keyId=\"{}\", algorithm=\"hmac-sha512\", created={}, headers=\"{}\", signature=\"{}\"",
            self.access_key_id, created, SIGNED_HEADERS, signature
        );

        let reqwest_method = match method {
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };

        let resp = self
            .client
            .request(reqwest_method, parsed)
            .header("Content-Type", "application/json")
            .header("Date", date)
            .header("Digest", digest)
            .header("Signature", signature_header)
            .body(body.to_vec())
            .send()?;

        let status = resp.status().as_u16();
        let body = resp.bytes()?.to_vec();
        debug!(method = method.as_str(), url, status, "rest round trip");

        Ok(Response { status, body })
    }
}

/// The canonical string covered by the request signature, one
/// `name: value` line per signed header.
fn signing_string(
    created: i64,
    method: Method,
    target: &str,
    content_length: usize,
    date: &str,
    digest: &str,
    host: &str,
) -> String {
    format!(
        "(created): {}\n\
         (request-target): {} {}\n\
         content-length: {}\n\
         content-type: application/json\n\
         date: {}\n\
         digest: {}\n\
         host: {}",
        created,
        method.as_str().to_ascii_lowercase(),
        target,
        content_length,
        date,
        digest,
        host
    )
}
