//! Users and their credential hashes.
//!
//! Hashes are stored as `sha256$<salt>$<hex digest>`. The digest starts as
//! SHA-256 over the salt bytes followed by the secret and is then re-hashed
//! until `HASH_ROUNDS` passes have run.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const HASH_SCHEME: &str = "sha256";
const HASH_ROUNDS: u32 = 10_000;

/// The persona the tutor adopts when talking to a particular user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub age: u32,
    pub persona: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub credential_hash: String,
    pub profile: Profile,
}

impl User {
    pub fn verify_secret(&self, secret: &str) -> bool {
        verify_secret(secret, &self.credential_hash)
    }
}

/// A hand-written user entry whose PIN has not been hashed yet.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    pub username: String,
    pub pin: String,
    pub profile: Profile,
}

impl UserSeed {
    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            credential_hash: hash_secret(&self.pin),
            username: self.username,
            profile: self.profile,
        }
    }
}

/// Hashes `secret` with a freshly generated salt.
pub fn hash_secret(secret: &str) -> String {
    let salt: [u8; 16] = rand::random();
    hash_with_salt(secret, &hex::encode(salt))
}

fn digest(secret: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..HASH_ROUNDS {
        digest = Sha256::digest(digest);
    }
    hex::encode(digest)
}

fn hash_with_salt(secret: &str, salt: &str) -> String {
    format!("{}${}${}", HASH_SCHEME, salt, digest(secret, salt))
}

/// Checks `secret` against a stored hash. Malformed hashes never verify.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(expected)) => {
            bool::from(digest(secret, salt).as_bytes().ct_eq(expected.as_bytes()))
        }
        _ => false,
    }
}
