//! Persistence boundary: the save-store contract and retrying saver.
//!
//! Only the fragment balance and permanent-tier items are persisted;
//! everything else is session-only. Store implementations live outside
//! this crate (the in-memory store here exists for tests and tooling).
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::item::SavedItem;

/// The persisted slice of a player's economy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub legendary_items: Vec<SavedItem>,
}

/// Store failures. Retried with bounded attempts and then logged; never
/// allowed to take down a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("save store unavailable: {0}")]
    Unavailable(String),
    #[error("save store rejected data for '{0}'")]
    Rejected(String),
}

/// Key-value save store contract implemented by the host platform.
pub trait SaveStore: Send + Sync {
    /// Load the saved slice for a player, `None` for first-time players.
    ///
    /// # Errors
    ///
    /// [`PersistError`] when the backing store cannot be reached.
    fn load(&self, player_key: &str) -> Result<Option<SaveData>, PersistError>;

    /// Persist the saved slice for a player.
    ///
    /// # Errors
    ///
    /// [`PersistError`] when the backing store cannot be reached or
    /// refuses the write.
    fn save(&self, player_key: &str, data: &SaveData) -> Result<(), PersistError>;
}

/// In-memory store for tests and the QA tester.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SaveData>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStore for MemoryStore {
    fn load(&self, player_key: &str) -> Result<Option<SaveData>, PersistError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::Unavailable("store lock poisoned".to_string()))?;
        Ok(entries.get(player_key).cloned())
    }

    fn save(&self, player_key: &str, data: &SaveData) -> Result<(), PersistError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::Unavailable("store lock poisoned".to_string()))?;
        entries.insert(player_key.to_string(), data.clone());
        Ok(())
    }
}

/// Save with bounded retries and a short backoff between attempts.
///
/// Failures are logged per attempt; exhaustion is logged as an error and
/// returned, but callers treat the in-memory state as authoritative and
/// keep the session running.
///
/// # Errors
///
/// The final [`PersistError`] when every attempt failed.
#[cfg(feature = "async")]
pub async fn save_with_retry(
    store: &dyn SaveStore,
    player_key: &str,
    data: &SaveData,
) -> Result<(), PersistError> {
    use crate::constants::{SAVE_ATTEMPTS, SAVE_BACKOFF_MS};
    use std::time::Duration;

    let mut last_err = PersistError::Unavailable("no attempts made".to_string());
    for attempt in 1..=SAVE_ATTEMPTS {
        match store.save(player_key, data) {
            Ok(()) => return Ok(()),
            Err(err) => {
                log::warn!("save attempt {attempt}/{SAVE_ATTEMPTS} for {player_key} failed: {err}");
                last_err = err;
            }
        }
        if attempt < SAVE_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(SAVE_BACKOFF_MS)).await;
        }
    }
    log::error!("save for {player_key} failed after {SAVE_ATTEMPTS} attempts: {last_err}");
    Err(last_err)
}

/// Load with bounded retries and a short backoff between attempts.
///
/// Exhaustion is logged and returned; the caller must treat the player as
/// unhydrated rather than assume a first-time session, or a later save
/// would overwrite data the store still holds.
///
/// # Errors
///
/// The final [`PersistError`] when every attempt failed.
#[cfg(feature = "async")]
pub async fn load_with_retry(
    store: &dyn SaveStore,
    player_key: &str,
) -> Result<Option<SaveData>, PersistError> {
    use crate::constants::{SAVE_ATTEMPTS, SAVE_BACKOFF_MS};
    use std::time::Duration;

    let mut last_err = PersistError::Unavailable("no attempts made".to_string());
    for attempt in 1..=SAVE_ATTEMPTS {
        match store.load(player_key) {
            Ok(data) => return Ok(data),
            Err(err) => {
                log::warn!("load attempt {attempt}/{SAVE_ATTEMPTS} for {player_key} failed: {err}");
                last_err = err;
            }
        }
        if attempt < SAVE_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(SAVE_BACKOFF_MS)).await;
        }
    }
    log::error!("load for {player_key} failed after {SAVE_ATTEMPTS} attempts: {last_err}");
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.load("p1").unwrap(), None);

        let data = SaveData {
            balance: 420,
            legendary_items: Vec::new(),
        };
        store.save("p1", &data).unwrap();
        assert_eq!(store.load("p1").unwrap(), Some(data));
    }

    #[cfg(feature = "async")]
    mod retry {
        use super::*;
        use std::sync::atomic::{AtomicU32, Ordering};

        /// Fails the first `failures` saves, then succeeds.
        #[derive(Default)]
        struct FlakyStore {
            failures: u32,
            attempts: AtomicU32,
            inner: MemoryStore,
        }

        impl SaveStore for FlakyStore {
            fn load(&self, player_key: &str) -> Result<Option<SaveData>, PersistError> {
                self.inner.load(player_key)
            }

            fn save(&self, player_key: &str, data: &SaveData) -> Result<(), PersistError> {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < self.failures {
                    return Err(PersistError::Unavailable("flaky".to_string()));
                }
                self.inner.save(player_key, data)
            }
        }

        #[tokio::test]
        async fn retries_recover_from_transient_failures() {
            let store = FlakyStore {
                failures: 2,
                ..FlakyStore::default()
            };
            let data = SaveData::default();
            assert!(save_with_retry(&store, "p1", &data).await.is_ok());
            assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        }

        /// Fails the first `failures` loads, then delegates.
        #[derive(Default)]
        struct FlakyLoadStore {
            failures: u32,
            attempts: AtomicU32,
            inner: MemoryStore,
        }

        impl SaveStore for FlakyLoadStore {
            fn load(&self, player_key: &str) -> Result<Option<SaveData>, PersistError> {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < self.failures {
                    return Err(PersistError::Unavailable("flaky".to_string()));
                }
                self.inner.load(player_key)
            }

            fn save(&self, player_key: &str, data: &SaveData) -> Result<(), PersistError> {
                self.inner.save(player_key, data)
            }
        }

        #[tokio::test]
        async fn load_retries_recover_from_transient_failures() {
            let store = FlakyLoadStore {
                failures: 2,
                ..FlakyLoadStore::default()
            };
            let data = SaveData {
                balance: 17,
                legendary_items: Vec::new(),
            };
            store.inner.save("p1", &data).unwrap();

            let loaded = load_with_retry(&store, "p1").await.unwrap();
            assert_eq!(loaded, Some(data));
            assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn exhausted_load_retries_surface_the_error() {
            let store = FlakyLoadStore {
                failures: 99,
                ..FlakyLoadStore::default()
            };
            let err = load_with_retry(&store, "p1").await.unwrap_err();
            assert!(matches!(err, PersistError::Unavailable(_)));
        }

        #[tokio::test]
        async fn exhausted_retries_surface_the_error() {
            let store = FlakyStore {
                failures: 99,
                ..FlakyStore::default()
            };
            let data = SaveData::default();
            let err = save_with_retry(&store, "p1", &data).await.unwrap_err();
            assert!(matches!(err, PersistError::Unavailable(_)));
        }
    }
}
