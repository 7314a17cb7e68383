//! Salted-hash credential helpers.
//!
//! The wire carries an opaque [`Auth`] block; these helpers implement the
//! standard scheme on top of it: a random per-credential salt and a SHA-256
//! digest over `ident || salt || password`. Servers verify in a
//! pre-middleware with [`check_hash`].

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::blocks::Auth;

/// Salt length in bytes.
const SALT_SIZE: usize = 16;

/// Create credentials for an ident/password pair with a fresh random salt.
pub fn create_auth(ident: &[u8], password: &[u8]) -> Auth {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill(&mut salt[..]);
    let hash = derive_hash(ident, &salt, password);
    Auth {
        ident: ident.to_vec(),
        salt: salt.to_vec(),
        hash,
    }
}

/// Verify a received hash against the expected ident/password pair.
pub fn check_hash(ident: &[u8], password: &[u8], salt: &[u8], hash: &[u8]) -> bool {
    derive_hash(ident, salt, password) == hash
}

fn derive_hash(ident: &[u8], salt: &[u8], password: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(ident);
    hasher.update(salt);
    hasher.update(password);
    hasher.finalize().to_vec()
}
