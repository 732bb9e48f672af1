//! Distributed lock primitives.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use nwloader_store::{DEL_IF_MATCH_SCRIPT, KeyStore, SetMode, SetStatus, StoreError};

use crate::error::LockError;

/// Default namespace for lock keys.
pub const DEFAULT_KEY_PREFIX: &str = "nwlock";

/// Default delay between acquisition retries and release polls.
pub const DEFAULT_CHECK_LOCK_DELAY: Duration = Duration::from_millis(100);

/// Default store-side expiry of a held lock.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Outcome of a [`RaceLock::race`] call.
///
/// Losing the race is a first-class result: the caller learns that someone
/// else ran (or is still running) the task and is expected to re-read
/// whatever state the winner produced, not to retry the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    /// This caller won the race; the task ran to completion here.
    Executed(T),
    /// Another holder owned the lock; the task did not run here.
    Skipped,
}

impl<T> RaceOutcome<T> {
    /// Returns `true` if the task ran in this process.
    pub fn executed(&self) -> bool {
        matches!(self, RaceOutcome::Executed(_))
    }

    /// Returns the task result, or `None` if the race was lost.
    pub fn into_result(self) -> Option<T> {
        match self {
            RaceOutcome::Executed(value) => Some(value),
            RaceOutcome::Skipped => None,
        }
    }
}

/// Lock mode, encoded as a suffix on the lock key so the two modes never
/// contend with each other for the same name.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Race,
    All,
}

impl Mode {
    fn suffix(self) -> &'static str {
        match self {
            Mode::Race => "race",
            Mode::All => "all",
        }
    }
}

/// Distributed single-flight and serialize lock over a shared [`KeyStore`].
///
/// For a fixed lock name, at most one task guarded by the same mode runs at
/// a time across every process sharing the store. Acquisition writes a
/// unique random token with `SET NX` and a store-side expiry; release
/// deletes the key only when it still holds that token, so an expired
/// holder cannot delete a successor's lock.
///
/// Cloning is cheap and clones share the underlying store handle.
pub struct RaceLock<S> {
    store: Arc<S>,
    key_prefix: String,
    check_lock_delay: Duration,
    default_timeout: Duration,
}

impl<S> Clone for RaceLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key_prefix: self.key_prefix.clone(),
            check_lock_delay: self.check_lock_delay,
            default_timeout: self.default_timeout,
        }
    }
}

impl<S: KeyStore> RaceLock<S> {
    /// Creates a new builder owning the given store.
    pub fn builder(store: S) -> RaceLockBuilder<S> {
        Self::builder_shared(Arc::new(store))
    }

    /// Creates a new builder sharing an existing store handle.
    pub fn builder_shared(store: Arc<S>) -> RaceLockBuilder<S> {
        RaceLockBuilder {
            store,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            check_lock_delay: DEFAULT_CHECK_LOCK_DELAY,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Runs `task` under mutual exclusion, waiting as long as it takes.
    ///
    /// Acquisition polls the store every `check_lock_delay` with no upper
    /// bound on the wait. Once acquired, `task` is invoked with `delayed`
    /// set to `true` iff at least one retry occurred. The lock is always
    /// released afterwards, on the success and the error path alike; a task
    /// error is re-raised as [`LockError::Task`] after the release.
    ///
    /// `timeout` is the store-side expiry of the lock key
    /// ([`DEFAULT_TIMEOUT`] when `None`), bounding how long a crashed
    /// holder can block its successors.
    pub async fn all<T, E, F, Fut>(
        &self,
        name: &str,
        timeout: Option<Duration>,
        task: F,
    ) -> Result<T, LockError<E>>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.lock_key(name, Mode::All);
        let timeout = timeout.unwrap_or(self.default_timeout);
        let token = new_token();

        let mut delayed = false;
        loop {
            match self
                .store
                .set(&key, &token, timeout, SetMode::IfAbsent)
                .await?
            {
                SetStatus::Written => break,
                SetStatus::Conflict => {
                    trace!(key = %key, "lock held elsewhere, retrying");
                    delayed = true;
                    sleep(self.check_lock_delay).await;
                }
            }
        }
        debug!(key = %key, delayed, "lock acquired");

        self.run_guarded(&key, &token, task, delayed).await
    }

    /// Runs `task` if this caller wins the single acquisition attempt.
    ///
    /// - Won: `task(false)` runs, the lock is released, and the result
    ///   comes back as [`RaceOutcome::Executed`].
    /// - Lost with `ignore`: returns [`RaceOutcome::Skipped`] immediately.
    /// - Lost without `ignore`: polls the lock key until the holder
    ///   releases it (or the lock expires), then returns
    ///   [`RaceOutcome::Skipped`]. The task does not run here and there is
    ///   no release to perform since this caller owns no token. Observing
    ///   the release says nothing about whether the holder succeeded;
    ///   callers must re-read whatever state the task maintains.
    ///
    /// A task error is re-raised as [`LockError::Task`] after the release.
    pub async fn race<T, E, F, Fut>(
        &self,
        name: &str,
        timeout: Option<Duration>,
        task: F,
        ignore: bool,
    ) -> Result<RaceOutcome<T>, LockError<E>>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.lock_key(name, Mode::Race);
        let timeout = timeout.unwrap_or(self.default_timeout);
        let token = new_token();

        match self
            .store
            .set(&key, &token, timeout, SetMode::IfAbsent)
            .await?
        {
            SetStatus::Written => {
                debug!(key = %key, "lock acquired");
                self.run_guarded(&key, &token, task, false)
                    .await
                    .map(RaceOutcome::Executed)
            }
            SetStatus::Conflict if ignore => {
                debug!(key = %key, "lock held elsewhere, skipping");
                Ok(RaceOutcome::Skipped)
            }
            SetStatus::Conflict => {
                debug!(key = %key, "lock held elsewhere, waiting for release");
                self.wait_released(&key).await?;
                Ok(RaceOutcome::Skipped)
            }
        }
    }

    /// Runs the task, then always releases, then surfaces the task result.
    async fn run_guarded<T, E, F, Fut>(
        &self,
        key: &str,
        token: &str,
        task: F,
        delayed: bool,
    ) -> Result<T, LockError<E>>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let task_result = task(delayed).await;
        let release_result = self.release(key, token).await;

        match task_result {
            Ok(value) => {
                release_result?;
                Ok(value)
            }
            Err(err) => {
                // The task error takes precedence over a failed release;
                // the lock key expires on its own either way.
                if let Err(store_err) = release_result {
                    warn!(key = %key, error = %store_err, "lock release failed after task error");
                }
                Err(LockError::Task(err))
            }
        }
    }

    /// Token-guarded release via [`DEL_IF_MATCH_SCRIPT`].
    async fn release(&self, key: &str, token: &str) -> Result<(), StoreError> {
        let removed = self
            .store
            .eval(DEL_IF_MATCH_SCRIPT, &[key], &[token])
            .await?;
        if removed == 0 {
            debug!(key = %key, "lock expired before release");
        }
        Ok(())
    }

    /// Polls until the lock key is absent.
    async fn wait_released(&self, key: &str) -> Result<(), StoreError> {
        loop {
            if self.store.get(key).await?.is_none() {
                return Ok(());
            }
            trace!(key = %key, "lock still held");
            sleep(self.check_lock_delay).await;
        }
    }

    fn lock_key(&self, name: &str, mode: Mode) -> String {
        format!("{}:{}:{}", self.key_prefix, name, mode.suffix())
    }
}

/// Builder for [`RaceLock`].
pub struct RaceLockBuilder<S> {
    store: Arc<S>,
    key_prefix: String,
    check_lock_delay: Duration,
    default_timeout: Duration,
}

impl<S: KeyStore> RaceLockBuilder<S> {
    /// Sets the namespace for lock keys. Default: `"nwlock"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the delay between acquisition retries and release polls.
    /// Default: 100 ms.
    pub fn check_lock_delay(mut self, delay: Duration) -> Self {
        self.check_lock_delay = delay;
        self
    }

    /// Sets the store-side expiry applied to lock keys when a call does not
    /// pass its own timeout. Default: 10 s.
    ///
    /// The expiry bounds the lock key's lifetime only; a task that outlasts
    /// it is not interrupted, and the token-guarded release tolerates the
    /// lock expiring mid-task.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Builds the [`RaceLock`].
    pub fn build(self) -> RaceLock<S> {
        RaceLock {
            store: self.store,
            key_prefix: self.key_prefix,
            check_lock_delay: self.check_lock_delay,
            default_timeout: self.default_timeout,
        }
    }
}

/// 160 bits of randomness, hex-encoded: 40 characters identifying one
/// acquisition.
fn new_token() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn lock_keys_carry_mode_suffix() {
        assert_eq!(Mode::Race.suffix(), "race");
        assert_eq!(Mode::All.suffix(), "all");
    }
}
