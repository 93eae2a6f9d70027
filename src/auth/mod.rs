//! Username/password credentials.
//!
//! [`CredentialStore`] is the seam the CLI and [`Session`](crate::session::Session)
//! depend on. [`FileCredentialStore`] keeps salted [`PasswordHash`]es in a
//! JSON file guarded by a lock file.

mod file_store;
mod hash;

pub use file_store::FileCredentialStore;
pub use hash::PasswordHash;

use std::path::PathBuf;

pub const USER_EXISTS: &str = "Username already exists!";
pub const ACCOUNT_CREATED: &str = "Account created successfully.";
pub const EMPTY_CREDENTIALS: &str = "Username and password must not be empty.";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("timed out waiting for credential store lock {0}")]
    LockTimeout(PathBuf),

    #[error("credential store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable username → credential mapping with verification.
pub trait CredentialStore: Send + Sync {
    /// Creates an account. Returns `(false, reason)` when the username is
    /// taken or the input is empty.
    fn register(&self, username: &str, password: &str) -> Result<(bool, String), AuthError>;

    /// Returns `true` if `username` exists and `password` matches.
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, AuthError>;
}
