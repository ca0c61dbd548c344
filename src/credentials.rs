//! Credentials: who is calling the service, and how requests are signed.
//!
//! Four strings identify a caller: the service host, a public access key id,
//! a secret signing key for request authentication, and the passphrase that
//! unlocks the account's RSA private key. They can be supplied directly, read
//! from the environment, or loaded from an INI-style profile file.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

const ENV_SERVER: &str = "PALISADE_SERVER";
const ENV_ACCESS_KEY_ID: &str = "PALISADE_ACCESS_KEY_ID";
const ENV_SECRET_SIGNING_KEY: &str = "PALISADE_SECRET_SIGNING_KEY";
const ENV_SECRET_CRYPTO_ACCESS_KEY: &str = "PALISADE_SECRET_CRYPTO_ACCESS_KEY";
const ENV_PROFILE: &str = "PALISADE_PROFILE";
const ENV_CREDENTIALS_FILE: &str = "PALISADE_CREDENTIALS_FILE";

const DEFAULT_HOST: &str = "https://api.palisade.example";

/// Caller identity and secrets. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    host: String,
    access_key_id: String,
    secret_signing_key: String,
    secret_crypto_access_key: String,
}

impl Credentials {
    /// Build credentials from explicit values.
    ///
    /// A host without a scheme gets `https://` prepended; a missing host
    /// falls back to the public endpoint.
    pub fn new(
        host: Option<&str>,
        access_key_id: &str,
        secret_signing_key: &str,
        secret_crypto_access_key: &str,
    ) -> Result<Self, Error> {
        if access_key_id.is_empty() {
            return Err(Error::InvalidArgument("access key id is empty".into()));
        }
        if secret_signing_key.is_empty() {
            return Err(Error::InvalidArgument("secret signing key is empty".into()));
        }
        if secret_crypto_access_key.is_empty() {
            return Err(Error::InvalidArgument(
                "secret crypto access key is empty".into(),
            ));
        }

        Ok(Self {
            host: normalize_host(host.unwrap_or(DEFAULT_HOST)),
            access_key_id: access_key_id.to_owned(),
            secret_signing_key: secret_signing_key.to_owned(),
            secret_crypto_access_key: secret_crypto_access_key.to_owned(),
        })
    }

    /// Load credentials, preferring environment variables over the profile
    /// file (`~/.palisade/credentials` unless overridden).
    ///
    /// Profile selection order: the `profile` argument, the
    /// `PALISADE_PROFILE` variable, then `default`.
    pub fn load(profile: Option<&str>) -> Result<Self, Error> {
        let mut fields = Fields::default();

        let path = match env::var(ENV_CREDENTIALS_FILE) {
            Ok(p) => Some(PathBuf::from(p)),
            Err(_) => default_credentials_path(),
        };
        if let Some(path) = path {
            if path.exists() {
                let profile = profile
                    .map(str::to_owned)
                    .or_else(|| env::var(ENV_PROFILE).ok())
                    .unwrap_or_else(|| "default".to_owned());
                fields = Fields::from_file(&path, &profile)?;
            }
        }

        fields.apply_env();
        fields.into_credentials()
    }

    /// Load credentials from a specific profile file, ignoring the
    /// environment entirely.
    pub fn from_file(path: impl AsRef<Path>, profile: Option<&str>) -> Result<Self, Error> {
        Fields::from_file(path.as_ref(), profile.unwrap_or("default"))?.into_credentials()
    }

    /// Load credentials from environment variables only.
    pub fn from_env() -> Result<Self, Error> {
        let mut fields = Fields::default();
        fields.apply_env();
        fields.into_credentials()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_signing_key(&self) -> &str {
        &self.secret_signing_key
    }

    pub fn secret_crypto_access_key(&self) -> &str {
        &self.secret_crypto_access_key
    }

    /// Versioned API root: `{host}/api/v0`.
    pub(crate) fn api_root(&self) -> String {
        format!("{}/api/v0", self.host)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("access_key_id", &self.access_key_id)
            .field("secret_signing_key", &"<redacted>")
            .field("secret_crypto_access_key", &"<redacted>")
            .finish()
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("https://{}", host)
    }
}

fn default_credentials_path() -> Option<PathBuf> {
    let home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join(".palisade").join("credentials"))
}

/// Partially collected credential fields, whatever the source.
#[derive(Default)]
struct Fields {
    server: Option<String>,
    access_key_id: Option<String>,
    secret_signing_key: Option<String>,
    secret_crypto_access_key: Option<String>,
}

impl Fields {
    fn from_file(path: &Path, profile: &str) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::InvalidArgument(format!("credentials file {}: {}", path.display(), e))
        })?;
        let profiles = parse_profiles(&text);
        let section = profiles.get(profile).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "profile [{}] not found in {}",
                profile,
                path.display()
            ))
        })?;

        Ok(Self {
            server: section.get("SERVER").cloned(),
            access_key_id: section.get("ACCESS_KEY_ID").cloned(),
            secret_signing_key: section.get("SECRET_SIGNING_KEY").cloned(),
            secret_crypto_access_key: section.get("SECRET_CRYPTO_ACCESS_KEY").cloned(),
        })
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var(ENV_SERVER) {
            self.server = Some(v);
        }
        if let Ok(v) = env::var(ENV_ACCESS_KEY_ID) {
            self.access_key_id = Some(v);
        }
        if let Ok(v) = env::var(ENV_SECRET_SIGNING_KEY) {
            self.secret_signing_key = Some(v);
        }
        if let Ok(v) = env::var(ENV_SECRET_CRYPTO_ACCESS_KEY) {
            self.secret_crypto_access_key = Some(v);
        }
    }

    fn into_credentials(self) -> Result<Credentials, Error> {
        Credentials::new(
            self.server.as_deref(),
            self.access_key_id.as_deref().unwrap_or(""),
            self.secret_signing_key.as_deref().unwrap_or(""),
            self.secret_crypto_access_key.as_deref().unwrap_or(""),
        )
    }
}

/// Minimal INI subset: `[section]` headers, `KEY = value` pairs, `#` or `;`
/// comment lines. Keys outside any section land under `default`.
fn parse_profiles(text: &str) -> HashMap<String, HashMap<String, String>> {
    let mut profiles: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current = "default".to_owned();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            current = line[1..line.len() - 1].trim().to_owned();
            profiles.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            profiles
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_owned(), value.trim().to_owned());
        }
    }

    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_values() {
        let c = Credentials::new(Some("api.example.com"), "pk", "sk", "pw").unwrap();
        assert_eq!(c.host(), "https://api.example.com");
        assert_eq!(c.api_root(), "https://api.example.com/api/v0");
        assert_eq!(c.access_key_id(), "pk");
    }

    #[test]
    fn explicit_scheme_is_preserved() {
        let c = Credentials::new(Some("http://localhost:8080/"), "pk", "sk", "pw").unwrap();
        assert_eq!(c.host(), "http://localhost:8080");
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(Credentials::new(None, "", "sk", "pw").is_err());
        assert!(Credentials::new(None, "pk", "", "pw").is_err());
        assert!(Credentials::new(None, "pk", "sk", "").is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = Credentials::new(None, "pk", "super-secret", "passphrase").unwrap();
        let s = format!("{:?}", c);
        assert!(!s.contains("super-secret"));
        assert!(!s.contains("passphrase"));
    }

    #[test]
    fn parse_sections_and_comments() {
        let text = "\
# a comment
SERVER = https://top.example

[default]
ACCESS_KEY_ID = abc
SECRET_SIGNING_KEY = def
; another comment
SECRET_CRYPTO_ACCESS_KEY = ghi

[staging]
ACCESS_KEY_ID = stg
";
        let profiles = parse_profiles(text);
        assert_eq!(profiles["default"]["ACCESS_KEY_ID"], "abc");
        assert_eq!(profiles["default"]["SERVER"], "https://top.example");
        assert_eq!(profiles["staging"]["ACCESS_KEY_ID"], "stg");
    }

    #[test]
    fn from_file_selects_profile() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            "[default]\n\
             SERVER = https://api.example.com\n\
             ACCESS_KEY_ID = id-default\n\
             SECRET_SIGNING_KEY = sign-default\n\
             SECRET_CRYPTO_ACCESS_KEY = crypt-default\n\
             \n\
             [alt]\n\
             ACCESS_KEY_ID = id-alt\n\
             SECRET_SIGNING_KEY = sign-alt\n\
             SECRET_CRYPTO_ACCESS_KEY = crypt-alt\n"
        )
        .unwrap();

        let c = Credentials::from_file(f.path(), None).unwrap();
        assert_eq!(c.access_key_id(), "id-default");
        assert_eq!(c.host(), "https://api.example.com");

        let c = Credentials::from_file(f.path(), Some("alt")).unwrap();
        assert_eq!(c.access_key_id(), "id-alt");

        assert!(Credentials::from_file(f.path(), Some("missing")).is_err());
    }
}
