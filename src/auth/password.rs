use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use constant_time_eq::constant_time_eq;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Hash that no password digests to. Login checks for unknown usernames run
/// against this so failure latency does not depend on whether the username
/// exists.
pub const DUMMY_HASH: &str =
    "AAAAAAAAAAAAAAAAAAAAAA==$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Hash a password as `base64(salt)$base64(sha256(salt || password))`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let digest = salted_digest(&salt, password);
    format!("{}${}", B64.encode(salt), B64.encode(digest))
}

/// Timing-safe verification against a stored hash. A malformed stored hash
/// still performs a full digest-and-compare before returning false.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let (salt, expected) = match parse_hash(stored) {
        Some(parts) => parts,
        None => {
            // Keep the work profile identical to the well-formed path.
            let digest = salted_digest(&[0u8; SALT_LEN], password);
            let _ = constant_time_eq(&digest, &[0u8; 32]);
            return false;
        }
    };
    let digest = salted_digest(&salt, password);
    constant_time_eq(&digest, &expected)
}

fn parse_hash(stored: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let (salt_b64, digest_b64) = stored.split_once('$')?;
    let salt = B64.decode(salt_b64).ok()?;
    let digest = B64.decode(digest_b64).ok()?;
    if digest.len() != 32 {
        return None;
    }
    Some((salt, digest))
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn dummy_hash_parses_and_never_verifies() {
        assert!(parse_hash(DUMMY_HASH).is_some());
        assert!(!verify_password("", DUMMY_HASH));
        assert!(!verify_password("anything", DUMMY_HASH));
    }

    #[test]
    fn malformed_stored_hash_is_rejected() {
        assert!(!verify_password("pw", "not-a-hash"));
        assert!(!verify_password("pw", "x$y"));
    }
}
