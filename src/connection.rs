//! Connection lifecycle: connection-string parsing, scoped acquisition with
//! guaranteed release, isolation levels and the optional reuse cache.

use crate::error::{driver_message, Error, Result};
use parking_lot::{Mutex, MutexGuard};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Connection parameters parsed from an ADO.NET style connection string.
#[derive(Clone, PartialEq)]
pub struct ConnectParams {
    /// TNS descriptor, EZConnect string or alias.
    pub data_source: String,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
}

impl ConnectParams {
    /// Create new connection parameters.
    pub fn new(
        data_source: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse a connection string like
    /// `Data Source=(DESCRIPTION=...);User Id=scott;Password=tiger;`.
    ///
    /// Keys are case-insensitive and values may contain `=`.
    pub fn parse(conn_str: &str) -> Result<Self> {
        let mut data_source = None;
        let mut username = None;
        let mut password = None;

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // Never echo the segment; it may be a password.
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::connection("Invalid connection string: segment without '='"))?;
            let value = value.trim().to_string();
            match normalize_key(key).as_str() {
                "datasource" | "server" => data_source = Some(value),
                "userid" | "user" | "uid" | "username" => username = Some(value),
                "password" | "pwd" => password = Some(value),
                other => debug!("Ignoring connection string key '{}'", other),
            }
        }

        let data_source =
            data_source.ok_or_else(|| Error::connection("Connection string has no Data Source"))?;
        let username =
            username.ok_or_else(|| Error::connection("Connection string has no User Id"))?;

        Ok(Self::new(data_source, username, password.unwrap_or_default()))
    }

    /// Open a native connection. Blocks the calling thread.
    pub fn connect_blocking(&self) -> Result<oracle::Connection> {
        oracle::Connection::connect(&self.username, &self.password, &self.data_source)
            .map_err(|e| Error::connection(driver_message(&e)))
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("data_source", &self.data_source)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Transaction isolation level for the transactional query path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum IsolationLevel {
    /// Maps to `Serializable`, not to the database default.
    #[default]
    Default,
    /// No explicit transaction isolation statement is issued.
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The `SET TRANSACTION` statement for this level, if any.
    ///
    /// Oracle offers only READ COMMITTED and SERIALIZABLE. Weaker levels
    /// map to READ COMMITTED, stronger ones to SERIALIZABLE.
    pub fn set_transaction_sql(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::None => None,
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => {
                Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            }
            IsolationLevel::Default
            | IsolationLevel::RepeatableRead
            | IsolationLevel::Serializable => Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"),
        }
    }
}

/// A native database connection.
///
/// The driver connection sits behind a mutex so only one command is in
/// flight per connection at a time.
pub struct Connection {
    inner: Mutex<oracle::Connection>,
    data_source: String,
}

impl Connection {
    /// Connect to an Oracle database using a connection string.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let params = ConnectParams::parse(conn_str)?;
        Self::connect_with_params(params).await
    }

    /// Connect with explicit connection parameters.
    pub async fn connect_with_params(params: ConnectParams) -> Result<Self> {
        let data_source = params.data_source.clone();
        let conn = tokio::task::spawn_blocking(move || params.connect_blocking()).await??;
        info!("Connected to {}", data_source);
        Ok(Self::from_native(conn, data_source))
    }

    /// Wrap an already opened native connection.
    pub fn from_native(conn: oracle::Connection, data_source: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(conn),
            data_source: data_source.into(),
        }
    }

    /// Data source this connection was opened against.
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    /// Lock the native connection for one command.
    pub fn lock(&self) -> MutexGuard<'_, oracle::Connection> {
        self.inner.lock()
    }

    /// Whether the native connection is still usable.
    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().status(), Ok(oracle::ConnStatus::Normal))
    }

    /// Close the native connection. Blocks the calling thread.
    pub fn close_blocking(&self) -> Result<()> {
        self.inner.lock().close()?;
        debug!("Closed connection to {}", self.data_source);
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("data_source", &self.data_source)
            .finish_non_exhaustive()
    }
}

/// Apply the command timeout; zero means no limit.
pub(crate) fn set_command_timeout(conn: &oracle::Connection, timeout_seconds: u32) -> Result<()> {
    let timeout = (timeout_seconds > 0).then(|| Duration::from_secs(u64::from(timeout_seconds)));
    conn.set_call_timeout(timeout)?;
    Ok(())
}

/// What happens to the connection when its lease ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Close the connection (one connection per invocation).
    Close,
    /// Leave it open; the reuse cache owns it.
    Keep,
}

/// Scoped ownership of a connection for one invocation.
///
/// Dropping the lease releases the connection according to its policy,
/// on every exit path including errors and cancellation.
#[derive(Debug)]
pub struct ConnectionLease {
    conn: Arc<Connection>,
    policy: ReleasePolicy,
}

impl ConnectionLease {
    /// Create a lease over a connection.
    pub fn new(conn: Arc<Connection>, policy: ReleasePolicy) -> Self {
        Self { conn, policy }
    }

    /// The leased connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Release policy of this lease.
    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }
}

/// Closing waits on the server, so inside a runtime it runs on the
/// blocking pool instead of the dropping thread.
impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.policy != ReleasePolicy::Close {
            return;
        }
        let conn = Arc::clone(&self.conn);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || close_quietly(&conn));
            }
            Err(_) => close_quietly(&conn),
        }
    }
}

fn close_quietly(conn: &Connection) {
    if let Err(e) = conn.close_blocking() {
        warn!("Failed to close connection to {}: {}", conn.data_source(), e);
    }
}

/// Acquire a connection for one invocation.
///
/// Without a cache a fresh connection is opened and closed when the lease
/// ends. With a cache the long-lived connection for `conn_str` is reused.
pub async fn acquire(conn_str: &str, cache: Option<&ConnectionCache>) -> Result<ConnectionLease> {
    match cache {
        Some(cache) => {
            let conn = cache.get_or_connect(conn_str).await?;
            Ok(ConnectionLease::new(conn, ReleasePolicy::Keep))
        }
        None => {
            let conn = Connection::connect(conn_str).await?;
            Ok(ConnectionLease::new(Arc::new(conn), ReleasePolicy::Close))
        }
    }
}

type CacheSlot = Arc<OnceCell<Arc<Connection>>>;

/// Reuse cache of long-lived connections keyed by connection string.
///
/// Holds at most one connection per key. Racing callers converge on a
/// single connection. Entries are never evicted automatically and are not
/// health-checked in the background; closed connections are replaced on
/// the next lookup and `evict`/`clear` remove entries explicitly.
#[derive(Default)]
pub struct ConnectionCache {
    entries: Mutex<HashMap<String, CacheSlot>>,
}

impl ConnectionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used by tasks that enable connection reuse.
    pub fn global() -> &'static ConnectionCache {
        static GLOBAL: OnceLock<ConnectionCache> = OnceLock::new();
        GLOBAL.get_or_init(ConnectionCache::new)
    }

    fn slot(&self, conn_str: &str) -> CacheSlot {
        self.entries
            .lock()
            .entry(conn_str.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Look up or lazily create the connection for `conn_str`.
    pub async fn get_or_connect(&self, conn_str: &str) -> Result<Arc<Connection>> {
        let slot = self.slot(conn_str);
        let conn = slot
            .get_or_try_init(|| async {
                debug!("Connection cache miss");
                Connection::connect(conn_str).await.map(Arc::new)
            })
            .await?
            .clone();

        if is_open_blocking(&conn).await? {
            return Ok(conn);
        }

        warn!("Cached connection to {} is closed, reconnecting", conn.data_source());
        self.remove_slot(conn_str, &slot);
        let slot = self.slot(conn_str);
        let conn = slot
            .get_or_try_init(|| async { Connection::connect(conn_str).await.map(Arc::new) })
            .await?
            .clone();
        Ok(conn)
    }

    fn remove_slot(&self, conn_str: &str, slot: &CacheSlot) {
        let mut entries = self.entries.lock();
        if entries.get(conn_str).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            entries.remove(conn_str);
        }
    }

    /// Remove the entry for `conn_str`, returning its connection if one was created.
    pub fn evict(&self, conn_str: &str) -> Option<Arc<Connection>> {
        self.entries
            .lock()
            .remove(conn_str)
            .and_then(|slot| slot.get().cloned())
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of keys in the cache.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether a connection has been created for `conn_str`.
    pub fn contains(&self, conn_str: &str) -> bool {
        self.entries
            .lock()
            .get(conn_str)
            .is_some_and(|slot| slot.initialized())
    }
}

impl fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("entries", &self.len())
            .finish()
    }
}

async fn is_open_blocking(conn: &Arc<Connection>) -> Result<bool> {
    let conn = Arc::clone(conn);
    Ok(tokio::task::spawn_blocking(move || conn.is_open()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=MyHost)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=ORCL)))";

    #[test]
    fn test_parse_descriptor_connection_string() {
        let conn_str = format!("Data Source={};User Id=myUsername;Password=myPassword;", DESCRIPTOR);
        let params = ConnectParams::parse(&conn_str).unwrap();

        assert_eq!(params.data_source, DESCRIPTOR);
        assert_eq!(params.username, "myUsername");
        assert_eq!(params.password, "myPassword");
    }

    #[test]
    fn test_parse_keys_case_and_aliases() {
        let params =
            ConnectParams::parse("data source=localhost:1521/xe; UID=SYSTEM ;PWD=salasana1;Persist Security Info=True")
                .unwrap();
        assert_eq!(params.data_source, "localhost:1521/xe");
        assert_eq!(params.username, "SYSTEM");
        assert_eq!(params.password, "salasana1");
    }

    #[test]
    fn test_parse_missing_parts() {
        assert!(matches!(
            ConnectParams::parse("User Id=scott;Password=tiger"),
            Err(Error::Connection { .. })
        ));
        assert!(matches!(
            ConnectParams::parse("Data Source=xe;Password=tiger"),
            Err(Error::Connection { .. })
        ));
        assert!(matches!(
            ConnectParams::parse("Data Source=xe;garbage"),
            Err(Error::Connection { .. })
        ));
    }

    #[test]
    fn test_password_not_in_debug_or_errors() {
        let params = ConnectParams::parse("Data Source=xe;User Id=scott;Password=tiger").unwrap();
        assert!(!format!("{:?}", params).contains("tiger"));

        let err = ConnectParams::parse("Data Source=xe;User Id=scott;tiger").unwrap_err();
        assert!(!err.to_string().contains("tiger"));
    }

    #[test]
    fn test_isolation_mapping() {
        assert_eq!(
            IsolationLevel::Default.set_transaction_sql(),
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        );
        assert_eq!(IsolationLevel::None.set_transaction_sql(), None);
        assert_eq!(
            IsolationLevel::ReadUncommitted.set_transaction_sql(),
            Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
        );
        assert_eq!(
            IsolationLevel::RepeatableRead.set_transaction_sql(),
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        );
    }

    #[test]
    fn test_cache_starts_empty_and_evicts() {
        let cache = ConnectionCache::new();
        assert!(cache.is_empty());
        assert!(!cache.contains("Data Source=xe;User Id=a"));

        // A slot without a connection is evicted without returning one.
        let _ = cache.slot("Data Source=xe;User Id=a");
        assert_eq!(cache.len(), 1);
        assert!(cache.evict("Data Source=xe;User Id=a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_slot_is_shared_per_key() {
        let cache = ConnectionCache::new();
        let a = cache.slot("k1");
        let b = cache.slot("k1");
        let c = cache.slot("k2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_failed_connect_leaves_key_uninitialized() {
        let cache = ConnectionCache::new();
        // Missing Data Source fails before any network activity.
        let result = cache.get_or_connect("User Id=scott").await;
        assert!(matches!(result, Err(Error::Connection { .. })));
        assert!(!cache.contains("User Id=scott"));
    }
}
