#![no_main]

use libfuzzer_sys::fuzz_target;

use palisade_client::transport::{Method, Response, Transport};
use palisade_client::{Credentials, Decryption, Error};

/// The fuzzer only exercises local frame handling; any attempt to reach the
/// service is refused.
struct NoTransport;

impl Transport for NoTransport {
    fn request(&self, _: Method, _: &str, _: &[u8]) -> Result<Response, Error> {
        Err(Error::Transport {
            detail: "offline".into(),
            status: None,
        })
    }
}

fuzz_target!(|data: &[u8]| {
    let creds = Credentials::new(Some("https://fuzz.invalid"), "k", "s", "p").unwrap();
    let mut session = Decryption::with_transport(&creds, std::sync::Arc::new(NoTransport));

    if session.begin().is_err() {
        return;
    }

    // feed the input in two fragments to hit the accumulation paths
    let split = data.len() / 2;
    let _ = session.update(&data[..split]);
    let _ = session.update(&data[split..]);
    let _ = session.end();
});
