use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// A salted PBKDF2-HMAC-SHA256 password digest as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub salt: String,
    pub iterations: u32,
    pub hash: String,
}

impl PasswordHash {
    /// Hashes `password` under a fresh random salt.
    pub fn new(password: &str, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        Self::with_salt(password, &salt, iterations)
    }

    pub fn with_salt(password: &str, salt: &[u8], iterations: u32) -> Self {
        Self {
            salt: hex::encode(salt),
            iterations,
            hash: hex::encode(derive(password, salt, iterations)),
        }
    }

    /// Recomputes the digest for `password` and compares in constant time.
    pub fn verify(&self, password: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(&self.salt), hex::decode(&self.hash)) else {
            return false;
        };
        let actual = derive(password, &salt, self.iterations);
        expected.as_slice().ct_eq(&actual[..]).into()
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations.max(1), &mut key);
    key
}
