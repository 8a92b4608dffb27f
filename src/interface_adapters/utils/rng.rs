use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use rand::RngCore;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Returns a process-unique, monotonically increasing identifier.
///
/// This avoids collisions that can happen with "timestamp only" IDs when multiple IDs are
/// generated in the same instant.
pub fn rand_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(now_nanos()));
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Hex digest of a SHA-256 hash over 60 CSPRNG bytes. This is the pre-hash
/// salt mixed into the password before argon2, not argon2's own salt
/// parameter.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 60];
    rand::thread_rng().fill_bytes(&mut bytes);
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// 32 URL-safe alphanumeric characters of session token entropy (not a UUID).
pub fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_64_hex_chars() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 64);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_token_is_32_chars() {
        assert_eq!(generate_session_token().len(), 32);
    }

    #[test]
    fn rand_id_is_monotonic() {
        let a = rand_id();
        let b = rand_id();
        assert!(b > a);
    }
}
