//! Algorithm registry: the small-integer ids that identify ciphers on the wire.
//!
//! The table is ordered; an entry's `id` equals its index and is the byte
//! written into every frame header. Additions append — existing ids are
//! frozen.

/// One supported AEAD cipher and its parameters.
#[derive(Debug, PartialEq, Eq)]
pub struct Algorithm {
    /// On-wire identifier (equals the table index).
    pub id: u8,
    /// Canonical name, matched case-insensitively against the server's
    /// `security_model.algorithm` field.
    pub name: &'static str,
    /// Data key length in bytes.
    pub key_len: usize,
    /// Initialization vector length in bytes.
    pub iv_len: usize,
    /// Authentication tag length in bytes.
    pub tag_len: usize,
}

const ALGORITHMS: [Algorithm; 2] = [
    Algorithm {
        id: 0,
        name: "aes-256-gcm",
        key_len: 32,
        iv_len: 12,
        tag_len: 16,
    },
    Algorithm {
        id: 1,
        name: "aes-128-gcm",
        key_len: 16,
        iv_len: 12,
        tag_len: 16,
    },
];

/// Look up an algorithm by its on-wire id.
pub fn by_id(id: u8) -> Option<&'static Algorithm> {
    ALGORITHMS.get(id as usize)
}

/// Look up an algorithm by name, case-insensitively.
pub fn by_name(name: &str) -> Option<&'static Algorithm> {
    ALGORITHMS.iter().find(|a| a.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_equal_indexes() {
        for (i, algo) in ALGORITHMS.iter().enumerate() {
            assert_eq!(algo.id as usize, i);
        }
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(by_id(0).unwrap().name, "aes-256-gcm");
        assert_eq!(by_id(1).unwrap().name, "aes-128-gcm");
        assert!(by_id(2).is_none());
        assert!(by_id(255).is_none());
    }

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        assert_eq!(by_name("AES-256-GCM").unwrap().id, 0);
        assert_eq!(by_name("aes-128-gcm").unwrap().id, 1);
        assert_eq!(by_name("Aes-128-Gcm").unwrap().id, 1);
        assert!(by_name("aes-256-siv").is_none());
        assert!(by_name("").is_none());
    }

    #[test]
    fn gcm_parameters() {
        let a = by_id(0).unwrap();
        assert_eq!((a.key_len, a.iv_len, a.tag_len), (32, 12, 16));
        let a = by_id(1).unwrap();
        assert_eq!((a.key_len, a.iv_len, a.tag_len), (16, 12, 16));
    }
}
