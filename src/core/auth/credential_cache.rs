// Credential cache and its owning session.
//
// The cache is the only durable piece of auth state. It is loaded once at startup,
// mutated in memory by the token acquirer, and written back only when something
// actually changed. `CacheSession` is the scoped owner: it flushes on `close()` or,
// failing that, when it is dropped.
//
// Single-process assumption: nothing here locks the backing file. Two processes
// sharing one cache file will overwrite each other's changes.

use super::auth_models::CachedAccount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Credential cache is corrupt: {0}")]
    Corrupt(String),

    #[error("Credential cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable backing for the serialized cache blob.
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    fn read(&self) -> Result<Option<Vec<u8>>, CacheError>;

    fn write(&self, bytes: &[u8]) -> Result<(), CacheError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    #[serde(default)]
    accounts: BTreeMap<String, CachedAccount>,
}

/// In-memory credential state plus a dirty flag.
#[derive(Debug, Default)]
pub struct CredentialCache {
    accounts: BTreeMap<String, CachedAccount>,
    /// Bytes as last read or written. An unchanged cache re-emits these verbatim.
    raw: Option<Vec<u8>>,
    dirty: bool,
}

impl CredentialCache {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self {
                raw: Some(bytes.to_vec()),
                ..Self::default()
            });
        }

        let document: CacheDocument =
            serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        if document.version > CACHE_FORMAT_VERSION {
            return Err(CacheError::Corrupt(format!(
                "unsupported cache version {}",
                document.version
            )));
        }

        Ok(Self {
            accounts: document.accounts,
            raw: Some(bytes.to_vec()),
            dirty: false,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        if let (false, Some(raw)) = (self.dirty, self.raw.as_ref()) {
            return Ok(raw.clone());
        }

        let document = CacheDocument {
            version: CACHE_FORMAT_VERSION,
            accounts: self.accounts.clone(),
        };
        serde_json::to_vec_pretty(&document).map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &CachedAccount> {
        self.accounts.values()
    }

    /// The account silent renewal is attempted with.
    pub fn first_account(&self) -> Option<&CachedAccount> {
        self.accounts.values().next()
    }

    pub fn account(&self, home_account_id: &str) -> Option<&CachedAccount> {
        self.accounts.get(home_account_id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Inserts or replaces an account. Replacing also replaces its current access
    /// token, so there is never more than one per account.
    pub fn upsert_account(&mut self, account: CachedAccount) {
        self.accounts
            .insert(account.home_account_id.clone(), account);
        self.dirty = true;
    }

    pub fn remove_account(&mut self, home_account_id: &str) -> bool {
        let removed = self.accounts.remove(home_account_id).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn has_state_changed(&self) -> bool {
        self.dirty
    }

    fn mark_persisted(&mut self, bytes: Vec<u8>) {
        self.raw = Some(bytes);
        self.dirty = false;
    }
}

/// Owns a `CredentialCache` for the lifetime of the process (or a test).
pub struct CacheSession<S: CredentialStore> {
    store: S,
    cache: CredentialCache,
    closed: bool,
}

impl<S: CredentialStore> CacheSession<S> {
    /// Loads the cache from `store`. A missing blob yields an empty cache; an
    /// unreadable one is an error.
    pub fn open(store: S) -> Result<Self, CacheError> {
        let cache = match store.read()? {
            Some(bytes) => CredentialCache::from_bytes(&bytes)?,
            None => {
                debug!("No credential cache on disk; starting empty");
                CredentialCache::default()
            }
        };

        info!(accounts = cache.len(), "Credential cache loaded");
        Ok(Self {
            store,
            cache,
            closed: false,
        })
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut CredentialCache {
        &mut self.cache
    }

    /// Writes the cache back if it changed since load (or since the last write).
    /// Returns whether anything was written.
    pub fn save_if_changed(&mut self) -> Result<bool, CacheError> {
        if !self.cache.has_state_changed() {
            return Ok(false);
        }

        let bytes = self.cache.to_bytes()?;
        self.store.write(&bytes)?;
        self.cache.mark_persisted(bytes);
        debug!(accounts = self.cache.len(), "Credential cache written");
        Ok(true)
    }

    /// Flushes and releases the session. After this, dropping does nothing.
    pub fn close(mut self) -> Result<bool, CacheError> {
        self.closed = true;
        self.save_if_changed()
    }
}

impl<S: CredentialStore> Drop for CacheSession<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.save_if_changed() {
            warn!("Failed to flush credential cache on release: {}", e);
        }
    }
}
