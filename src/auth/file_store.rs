use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, info, warn};

use super::{ACCOUNT_CREATED, AuthError, CredentialStore, EMPTY_CREDENTIALS, PasswordHash, USER_EXISTS};

const DEFAULT_ITERATIONS: u32 = 100_000;
const LOCK_RETRY: Duration = Duration::from_millis(25);

/// Credentials persisted as a JSON object:
///
/// ```json
/// {
///   "alice": { "salt": "…", "iterations": 100000, "hash": "…" }
/// }
/// ```
///
/// Registrations hold an exclusive advisory lock on `<path>.lock` for the
/// whole read-modify-write and replace the file via rename, so concurrent
/// writers cannot lose each other's accounts and readers never see a partial
/// file. The OS drops the lock with its holder, so a crashed process leaves
/// nothing to clean up.
pub struct FileCredentialStore {
    path: PathBuf,
    iterations: u32,
    lock_timeout: Duration,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            iterations: DEFAULT_ITERATIONS,
            lock_timeout: Duration::from_secs(5),
        }
    }

    /// Overrides the hash iteration count for new registrations.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_users(&self) -> Result<BTreeMap<String, PasswordHash>, AuthError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_users(&self, users: &BTreeMap<String, PasswordHash>) -> Result<(), AuthError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = sibling(&self.path, "tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(users)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    #[tracing::instrument(skip(self, password), fields(store = %self.path.display()))]
    fn register(&self, username: &str, password: &str) -> Result<(bool, String), AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Ok((false, EMPTY_CREDENTIALS.to_string()));
        }

        let _lock = StoreLock::acquire(&self.path, self.lock_timeout)?;
        let mut users = self.load_users()?;
        if users.contains_key(username) {
            warn!("Registration refused, username taken");
            return Ok((false, USER_EXISTS.to_string()));
        }

        users.insert(username.to_string(), PasswordHash::new(password, self.iterations));
        self.save_users(&users)?;
        info!(accounts = users.len(), "Account created");
        Ok((true, ACCOUNT_CREATED.to_string()))
    }

    #[tracing::instrument(skip(self, password), fields(store = %self.path.display()))]
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let users = self.load_users()?;
        let ok = users.get(username).is_some_and(|h| h.verify(password));
        debug!(ok, "Authentication checked");
        Ok(ok)
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Exclusive advisory lock on `<store>.lock`, released when the handle is
/// closed.
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(store: &Path, timeout: Duration) -> Result<Self, AuthError> {
        let path = sibling(store, "lock");
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { _file: file }),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if start.elapsed() >= timeout {
                        return Err(AuthError::LockTimeout(path));
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
