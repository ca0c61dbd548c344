//! Error types for the Palisade client.

use std::fmt;

/// Everything that can go wrong between a caller and the service.
///
/// Each public API either succeeds or returns one of these kinds; partial
/// output is never handed back alongside an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied value is unusable: empty credential field, unknown
    /// algorithm name from the server, zero-length host.
    InvalidArgument(String),
    /// Network failure, signing failure, or an unexpected HTTP status.
    Transport {
        detail: String,
        status: Option<u16>,
    },
    /// The peer broke the wire contract: missing or mistyped JSON field,
    /// unsupported header version, truncated frame.
    Protocol(String),
    /// A cryptographic operation failed: PEM decryption with a wrong
    /// passphrase, RSA unwrap, authentication tag mismatch, RNG failure.
    Crypto(&'static str),
    /// An operation was invoked in the wrong session state.
    State(&'static str),
    /// The data key has no remaining uses.
    QuotaExhausted,
}

impl Error {
    pub(crate) fn status(detail: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            detail: detail.into(),
            status: Some(status),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Transport {
                detail,
                status: Some(code),
            } => write!(f, "transport failure: {} (http {})", detail, code),
            Self::Transport { detail, .. } => write!(f, "transport failure: {}", detail),
            Self::Protocol(msg) => write!(f, "protocol violation: {}", msg),
            Self::Crypto(msg) => write!(f, "crypto failure: {}", msg),
            Self::State(msg) => write!(f, "state error: {}", msg),
            Self::QuotaExhausted => write!(f, "data key quota exhausted"),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            detail: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}
