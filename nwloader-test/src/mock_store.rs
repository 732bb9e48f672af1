use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use nwloader_store::{
    DEL_IF_MATCH_SCRIPT, KeyStore, SetMode, SetStatus, StoreResult, Ttl,
};

#[derive(Debug, Default)]
pub struct StoreCounters {
    pub get_count: AtomicUsize,
    pub set_count: AtomicUsize,
    pub set_conflict_count: AtomicUsize,
    pub del_count: AtomicUsize,
    pub eval_count: AtomicUsize,
}

impl StoreCounters {
    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }

    pub fn set_conflict_count(&self) -> usize {
        self.set_conflict_count.load(Ordering::SeqCst)
    }

    pub fn del_count(&self) -> usize {
        self.del_count.load(Ordering::SeqCst)
    }

    pub fn eval_count(&self) -> usize {
        self.eval_count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.get_count.store(0, Ordering::SeqCst);
        self.set_count.store(0, Ordering::SeqCst);
        self.set_conflict_count.store(0, Ordering::SeqCst);
        self.del_count.store(0, Ordering::SeqCst);
        self.eval_count.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    /// `None` means the entry never expires, which the production paths
    /// never write; [`MemoryStore::insert_without_expiry`] exists to test
    /// how readers treat such entries.
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-process [`KeyStore`] with real expiry and conditional-write semantics.
///
/// Expiry follows the tokio clock (`tokio::time::Instant`), so tests may
/// `tokio::time::pause()` and `advance()` instead of sleeping for real.
/// Expired entries are dropped lazily on access, like Redis does.
///
/// The only script [`KeyStore::eval`] accepts is the token-guarded delete;
/// anything else panics, since nothing in the workspace evaluates other
/// scripts.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    counters: Arc<StoreCounters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &StoreCounters {
        &self.counters
    }

    /// Number of live (non-expired) entries.
    pub fn live_entry_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    /// Raw blob under `key`, ignoring counters.
    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone())
    }

    /// Remaining lifetime of a live entry, at full resolution.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|e| !e.is_expired())
            .and_then(|e| e.expires_at)
            .map(|at| at.duration_since(Instant::now()))
    }

    /// Plants a raw blob with no expiry, bypassing counters.
    pub fn insert_without_expiry(&self, key: &str, value: &str) {
        self.entries.insert(
            key.to_owned(),
            StoredValue {
                value: value.to_owned(),
                expires_at: None,
            },
        );
    }

    fn drop_if_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, v| v.is_expired());
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.counters.get_count.fetch_add(1, Ordering::SeqCst);
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {}
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        }
        self.drop_if_expired(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        expire: Duration,
        mode: SetMode,
    ) -> StoreResult<SetStatus> {
        self.counters.set_count.fetch_add(1, Ordering::SeqCst);
        let stored = StoredValue {
            value: value.to_owned(),
            expires_at: Some(Instant::now() + expire),
        };
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if mode == SetMode::IfAbsent && !occupied.get().is_expired() {
                    self.counters
                        .set_conflict_count
                        .fetch_add(1, Ordering::SeqCst);
                    return Ok(SetStatus::Conflict);
                }
                occupied.insert(stored);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(stored);
            }
        }
        Ok(SetStatus::Written)
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        self.counters.del_count.fetch_add(1, Ordering::SeqCst);
        match self.entries.remove(key) {
            Some((_, value)) if !value.is_expired() => Ok(1),
            _ => Ok(0),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<Ttl> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {}
            Some(entry) => {
                return Ok(match entry.expires_at {
                    Some(at) => Ttl::Remaining(at.duration_since(Instant::now())),
                    None => Ttl::NoExpiry,
                });
            }
            None => return Ok(Ttl::Missing),
        }
        self.drop_if_expired(key);
        Ok(Ttl::Missing)
    }

    async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> StoreResult<i64> {
        self.counters.eval_count.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            script, DEL_IF_MATCH_SCRIPT,
            "MemoryStore only evaluates the token-guarded delete script"
        );
        let key = keys.first().expect("script requires one key");
        let token = args.first().expect("script requires one argument");
        let removed = self
            .entries
            .remove_if(*key, |_, v| !v.is_expired() && v.value == *token);
        Ok(if removed.is_some() { 1 } else { 0 })
    }
}
