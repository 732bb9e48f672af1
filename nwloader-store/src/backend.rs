//! Redis implementation of the store contract.

use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;

use crate::error::StoreError;
use crate::store::{KeyStore, SetMode, SetStatus, StoreResult, Ttl};

/// Store adapter for a single Redis node.
///
/// The connection is established lazily on the first operation and
/// multiplexed for concurrent access. Use [`RedisStore::builder`] to
/// construct this type.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use nwloader_store::RedisStore;
///
/// # fn main() -> Result<(), nwloader_store::StoreError> {
/// let store = RedisStore::builder()
///     .url("redis://localhost:6379/0")
///     .username("cache_user")
///     .password("secret")
///     .connection_timeout(Duration::from_secs(5))
///     .response_timeout(Duration::from_secs(2))
///     .retries(3)
///     .build()?;
/// # Ok(())
/// # }
/// ```
///
/// # Caveats
///
/// - The first store operation fails if Redis is unreachable; `build` only
///   validates the configuration.
/// - Expiry is passed to Redis in milliseconds (`PX`), but `ttl` reports
///   whole seconds because that is the resolution of the `TTL` command.
#[derive(Clone)]
pub struct RedisStore {
    url: String,
    username: Option<String>,
    password: Option<String>,
    connection_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    number_of_retries: Option<usize>,

    /// Lazy-initialized connection, established on first use.
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Creates a new builder for `RedisStore`.
    #[must_use]
    pub fn builder() -> RedisStoreBuilder {
        RedisStoreBuilder::default()
    }

    /// Gets or initializes the connection lazily.
    ///
    /// Establishes the connection only once, even when called concurrently
    /// from multiple tasks; subsequent calls return the cached manager.
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let mut info: redis::ConnectionInfo = self.url.as_str().parse()?;
                if let Some(ref username) = self.username {
                    info.redis.username = Some(username.clone());
                }
                if let Some(ref password) = self.password {
                    info.redis.password = Some(password.clone());
                }

                let client = Client::open(info)?;

                let mut config = ConnectionManagerConfig::new();
                if let Some(timeout) = self.connection_timeout {
                    config = config.set_connection_timeout(timeout);
                }
                if let Some(timeout) = self.response_timeout {
                    config = config.set_response_timeout(timeout);
                }
                if let Some(retries) = self.number_of_retries {
                    config = config.set_number_of_retries(retries);
                }

                let manager = client.get_connection_manager_with_config(config).await?;
                Ok::<_, StoreError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl KeyStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        expire: Duration,
        mode: SetMode,
    ) -> StoreResult<SetStatus> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("PX")
            .arg(expire.as_millis() as u64);
        if mode == SetMode::IfAbsent {
            cmd.arg("NX");
        }
        // SET replies OK, or nil when NX loses.
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(match reply {
            Some(_) => SetStatus::Written,
            None => SetStatus::Conflict,
        })
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.connection().await?;
        let removed: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Ttl> {
        let mut conn = self.connection().await?;
        let reply: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(match reply {
            -2 => Ttl::Missing,
            -1 => Ttl::NoExpiry,
            secs => Ttl::Remaining(Duration::from_secs(secs.max(0) as u64)),
        })
    }

    async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        let script = redis::Script::new(script);
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        let reply: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(reply)
    }
}

/// Builder for creating and configuring a [`RedisStore`].
#[derive(Default)]
pub struct RedisStoreBuilder {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    connection_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    number_of_retries: Option<usize>,
}

impl RedisStoreBuilder {
    /// Sets the Redis connection URL, in the format
    /// `redis://[:<password>@]<host>[:<port>][/<database>]`.
    ///
    /// This is required before calling [`build`](Self::build).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the username for Redis authentication (Redis 6+ ACL).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password for Redis authentication.
    ///
    /// Works with both legacy `AUTH` and Redis 6+ ACL authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the timeout for establishing a connection.
    ///
    /// # Default
    ///
    /// No timeout (waits indefinitely).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the timeout for waiting on a reply after a command was sent.
    ///
    /// # Default
    ///
    /// No timeout (waits indefinitely).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of reconnection attempts.
    ///
    /// # Default
    ///
    /// The redis-rs default.
    pub fn retries(mut self, count: usize) -> Self {
        self.number_of_retries = Some(count);
        self
    }

    /// Builds the [`RedisStore`] with the configured settings.
    ///
    /// This method is synchronous; the connection is established lazily on
    /// the first store operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingUrl`] if no URL was specified.
    pub fn build(self) -> Result<RedisStore, StoreError> {
        let url = self.url.ok_or(StoreError::MissingUrl)?;

        Ok(RedisStore {
            url,
            username: self.username,
            password: self.password,
            connection_timeout: self.connection_timeout,
            response_timeout: self.response_timeout,
            number_of_retries: self.number_of_retries,
            connection: OnceCell::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_url_is_rejected() {
        let result = RedisStore::builder().password("secret").build();
        assert!(matches!(result, Err(StoreError::MissingUrl)));
    }

    #[test]
    fn build_is_lazy() {
        // An unreachable URL must not fail at build time.
        let store = RedisStore::builder()
            .url("redis://nowhere.invalid:6379/")
            .build();
        assert!(store.is_ok());
    }
}
