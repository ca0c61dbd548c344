//! # Palisade Client SDK
//!
//! Client-side core of the Palisade hosted encryption service. Applications
//! hand it plaintext and credentials; it negotiates a bounded-use data key
//! with the service and produces a self-describing ciphertext frame that
//! embeds everything a matching decryptor needs — except the data key
//! itself, which travels wrapped under the customer's RSA public key.
//!
//! ## Quick Start
//!
//! ```no_run
//! use palisade_client::{decrypt, encrypt, Credentials};
//!
//! # fn main() -> Result<(), palisade_client::Error> {
//! let creds = Credentials::load(None)?;
//!
//! let ciphertext = encrypt(&creds, b"attack at dawn")?;
//! let plaintext = decrypt(&creds, &ciphertext)?;
//!
//! assert_eq!(plaintext, b"attack at dawn");
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! A session amortizes one server round-trip over up to `uses` encryptions,
//! each framed independently and fed fragment by fragment:
//!
//! ```no_run
//! use palisade_client::{Credentials, Encryption};
//!
//! # fn main() -> Result<(), palisade_client::Error> {
//! let creds = Credentials::load(None)?;
//! let mut session = Encryption::new(&creds, 5)?;
//!
//! let mut frame = session.begin()?;
//! frame.extend_from_slice(&session.update(b"Hello, ")?);
//! frame.extend_from_slice(&session.update(b"World!")?);
//! frame.extend_from_slice(&session.end()?);
//!
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Properties
//!
//! - **Bounded-use keys**: the service grants a use quota per data key;
//!   sessions enforce it locally and report actual usage on teardown
//! - **Self-describing frames**: versioned header carrying algorithm id,
//!   IV, and the wrapped data key
//! - **Streaming**: fragments of any size in either direction, with the
//!   authentication tag trailing the ciphertext
//! - **Key hygiene**: unwrapped keys live only in memory and zeroize on drop
//!
//! ## What's NOT Provided
//!
//! - Key persistence on disk
//! - Cipher-suite negotiation (the server dictates)
//! - Multi-recipient envelopes
//! - Re-keying mid-stream

#![deny(unsafe_code)]

// ---------------------------------------------------------------------------
// Internal modules (not part of public API)
// ---------------------------------------------------------------------------

mod cache;
mod error;

// Wire-level modules are exposed for frame inspection and fuzzing but are
// not considered stable API
#[doc(hidden)]
pub mod gcm;
#[doc(hidden)]
pub mod header;

// ---------------------------------------------------------------------------
// Public SDK interface
// ---------------------------------------------------------------------------

pub mod algorithm;
pub mod transport;

mod credentials;
mod decrypt;
mod encrypt;

pub use credentials::Credentials;
pub use decrypt::{decrypt, Decryption};
pub use encrypt::{encrypt, Encryption};
pub use error::Error;
