//! Redis store backend.
//!
//! Locks and create-if-absent records map to `SET NX PX`; windowed
//! counters use a small Lua script so the increment and the initial
//! window expiry are applied in one atomic step.

use crate::store::{AtomicStore, StoreError, StoreResult};
use folio_core::BoxFuture;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::time::Duration;

/// Increments a counter and binds its lifetime to the window on first use.
const INCREMENT_SCRIPT: &str = r"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
";

/// Deletes a lock only if the stored token still matches the caller's.
const UNLOCK_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
";

/// A Redis-backed [`AtomicStore`].
///
/// Connections are multiplexed through a [`ConnectionManager`], which
/// reconnects transparently; individual command failures surface as
/// [`StoreError::Unavailable`].
///
/// # Example
///
/// ```rust,ignore
/// use folio_store::RedisStore;
///
/// let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
/// ```
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    increment: Script,
    unlock: Script,
}

impl RedisStore {
    /// Connects to the Redis instance at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is invalid or the
    /// initial connection cannot be established.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis connect failed: {e}")))?;

        Ok(Self {
            conn,
            increment: Script::new(INCREMENT_SCRIPT),
            unlock: Script::new(UNLOCK_SCRIPT),
        })
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl AtomicStore for RedisStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<Option<String>>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("GET failed: {e}")))
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(Self::ttl_millis(ttl))
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("SET failed: {e}")))
        })
    }

    fn put_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(Self::ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("SET NX failed: {e}")))?;
            Ok(reply.is_some())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            redis::cmd("DEL")
                .arg(key)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("DEL failed: {e}")))?;
            Ok(())
        })
    }

    fn increment<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            self.increment
                .key(key)
                .arg(Self::ttl_millis(ttl))
                .invoke_async::<u64>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("INCR script failed: {e}")))
        })
    }

    fn unlock<'a>(&'a self, key: &'a str, token: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            self.unlock
                .key(key)
                .arg(token)
                .invoke_async::<i64>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(format!("unlock script failed: {e}")))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_floors_at_one() {
        assert_eq!(RedisStore::ttl_millis(Duration::from_nanos(1)), 1);
        assert_eq!(RedisStore::ttl_millis(Duration::from_secs(1)), 1_000);
    }

    #[test]
    fn test_increment_script_shape() {
        // The script must set the expiry only on first increment so a
        // counter cannot outlive its window.
        assert!(INCREMENT_SCRIPT.contains("INCR"));
        assert!(INCREMENT_SCRIPT.contains("PEXPIRE"));
        assert!(INCREMENT_SCRIPT.contains("current == 1"));
    }

    #[test]
    fn test_unlock_script_shape() {
        // The token comparison and the delete must run in one script so
        // a stale release cannot remove a lock it no longer owns.
        assert!(UNLOCK_SCRIPT.contains("GET"));
        assert!(UNLOCK_SCRIPT.contains("ARGV[1]"));
        assert!(UNLOCK_SCRIPT.contains("DEL"));
    }
}
