// crates/campaign-lens-core/src/store.rs
// ============================================================================
// Module: Credential Store
// Description: Durable storage for the OAuth2 token triple.
// Purpose: Read the credential at startup and overwrite it on every update.
// Dependencies: async-trait, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! The durable credential file is a flat JSON object with `refresh_token`,
//! `access_token` (nullable) and `expiry_date` (nullable epoch millis). The
//! file copy is best-effort: the process environment remains the durable
//! source of truth across restarts, and values written here are surfaced to
//! the operator separately through the operator channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::credential::Credential;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size accepted for the durable credential file.
pub const MAX_CREDENTIAL_FILE_BYTES: u64 = 64 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Credential store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("credential store io error: {0}")]
    Io(String),
    /// Stored content could not be decoded.
    #[error("credential store parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Store Trait
// ============================================================================

/// Durable home of the credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the stored credential, returning `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store exists but cannot be read.
    async fn load(&self) -> Result<Option<Credential>, StoreError>;

    /// Overwrites the stored credential wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the credential cannot be written.
    async fn save(&self, credential: &Credential) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: File Store
// ============================================================================

/// JSON file credential store.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    /// Path to the token file.
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store rooted at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the token file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the sibling path used for atomic replacement.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        if metadata.len() > MAX_CREDENTIAL_FILE_BYTES {
            return Err(StoreError::Io(format!(
                "credential file exceeds {MAX_CREDENTIAL_FILE_BYTES} bytes"
            )));
        }
        let bytes =
            tokio::fs::read(&self.path).await.map_err(|err| StoreError::Io(err.to_string()))?;
        let credential: Credential =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Parse(err.to_string()))?;
        if credential.refresh_token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::Io(err.to_string()))?;
        }
        let mut bytes = serde_json::to_vec_pretty(credential)
            .map_err(|err| StoreError::Parse(err.to_string()))?;
        bytes.push(b'\n');
        let staging = self.staging_path();
        write_private(&staging, &bytes).await.map_err(|err| StoreError::Io(err.to_string()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| StoreError::Io(err.to_string()))
    }
}

/// Writes `bytes` to a fresh file readable only by the owner on unix.
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // The mode only applies on create, so a stale file is removed first.
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory credential store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    /// Stored credential.
    credential: Mutex<Option<Credential>>,
    /// Number of completed saves.
    saves: Mutex<usize>,
}

impl InMemoryCredentialStore {
    /// Creates a store pre-populated with `credential`.
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
            saves: Mutex::new(0),
        }
    }

    /// Returns the stored credential without going through the async trait.
    #[must_use]
    pub fn snapshot(&self) -> Option<Credential> {
        self.credential.lock().ok().and_then(|guard| guard.clone())
    }

    /// Returns how many times the credential has been saved.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|guard| *guard).unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        self.credential
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::Io("credential store mutex poisoned".to_string()))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        {
            let mut guard = self
                .credential
                .lock()
                .map_err(|_| StoreError::Io("credential store mutex poisoned".to_string()))?;
            *guard = Some(credential.clone());
        }
        let mut saves = self
            .saves
            .lock()
            .map_err(|_| StoreError::Io("credential store mutex poisoned".to_string()))?;
        *saves += 1;
        Ok(())
    }
}
