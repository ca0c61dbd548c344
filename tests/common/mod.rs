//! Shared fixtures: a fake service key ceremony and a scriptable transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use rsa::pkcs8::EncodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;

use palisade_client::transport::{Method, Response, Transport};
use palisade_client::{Credentials, Error};

pub const SESSION_ID: &str = "sess-0fd6a1";
pub const FINGERPRINT: &str = "fp-4bd21c88";
pub const PASSPHRASE: &str = "humming-quartz-42";

/// Everything the service would hold for one customer: an RSA keypair
/// (private half passphrase-encrypted), plus one wrapped data key.
pub struct TestServer {
    pub private_pem: String,
    pub data_key: Vec<u8>,
    pub wrapped_b64: String,
}

impl TestServer {
    /// `key_len` selects the AEAD data key size (32 or 16).
    pub fn generate(key_len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen");
        let public_key = private_key.to_public_key();

        // light PBKDF2 parameters keep the fixture fast; production keys use
        // whatever the service picks
        let der = private_key.to_pkcs8_der().expect("pkcs8 der");
        let info = pkcs8::PrivateKeyInfo::try_from(der.as_bytes()).expect("pkcs8 parse");
        let mut salt = [0u8; 16];
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);
        let params = pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, &salt, &iv)
            .expect("pbes2 params");
        let encrypted = info
            .encrypt_with_params(params, PASSPHRASE)
            .expect("pkcs8 encrypt");
        let private_pem = encrypted
            .to_pem("ENCRYPTED PRIVATE KEY", pkcs8::LineEnding::LF)
            .expect("pem encode")
            .to_string();

        let mut data_key = vec![0u8; key_len];
        rng.fill_bytes(&mut data_key);
        let wrapped = public_key
            .encrypt(&mut rng, Oaep::new::<Sha1>(), &data_key)
            .expect("oaep wrap");

        Self {
            private_pem,
            data_key,
            wrapped_b64: BASE64.encode(wrapped),
        }
    }

    /// Response body for `POST /api/v0/encryption/key`.
    pub fn new_key_json(&self, algorithm: &str, max_uses: u32) -> Vec<u8> {
        serde_json::json!({
            "encrypted_private_key": self.private_pem,
            "encryption_session": SESSION_ID,
            "key_fingerprint": FINGERPRINT,
            "wrapped_data_key": self.wrapped_b64,
            "encrypted_data_key": self.wrapped_b64,
            "max_uses": max_uses,
            "security_model": {
                "algorithm": algorithm,
                "enable_data_fragmentation": false,
            },
        })
        .to_string()
        .into_bytes()
    }

    /// Response body for `POST /api/v0/decryption/key`.
    pub fn unwrap_json(&self) -> Vec<u8> {
        serde_json::json!({
            "encrypted_private_key": self.private_pem,
            "wrapped_data_key": self.wrapped_b64,
            "encryption_session": SESSION_ID,
            "key_fingerprint": FINGERPRINT,
        })
        .to_string()
        .into_bytes()
    }

    pub fn wrapped_key_bytes(&self) -> Vec<u8> {
        BASE64.decode(&self.wrapped_b64).unwrap()
    }
}

/// Shared fixture for tests that don't count transport requests.
pub fn shared_server() -> &'static TestServer {
    static SERVER: OnceLock<TestServer> = OnceLock::new();
    SERVER.get_or_init(|| TestServer::generate(32))
}

pub fn test_credentials() -> Credentials {
    Credentials::new(
        Some("https://api.test.example"),
        "test-access-key",
        "test-signing-key",
        PASSPHRASE,
    )
    .unwrap()
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub url: String,
    pub body: String,
}

/// Transport double: replays queued responses and records every request.
///
/// With the queue empty, PATCH gets 204 (the usual usage-report answer) and
/// anything else gets 500 so an unexpected request fails loudly.
pub struct MockTransport {
    requests: Mutex<Vec<Recorded>>,
    responses: Mutex<VecDeque<(u16, Vec<u8>)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        })
    }

    pub fn push_response(&self, status: u16, body: Vec<u8>) {
        self.responses.lock().unwrap().push_back((status, body));
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn request(&self, method: Method, url: &str, body: &[u8]) -> Result<Response, Error> {
        self.requests.lock().unwrap().push(Recorded {
            method,
            url: url.to_owned(),
            body: String::from_utf8_lossy(body).into_owned(),
        });

        let (status, body) = match self.responses.lock().unwrap().pop_front() {
            Some(r) => r,
            None if method == Method::Patch => (204, Vec::new()),
            None => (500, Vec::new()),
        };
        Ok(Response { status, body })
    }
}
