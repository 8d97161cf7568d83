//! A simple, synchronous, thread-safe pooled data source.
//!
//! One mutex serializes all pool mutations; one condition variable signals
//! returning connections. Checked-out connections are wrapped so that
//! returning, reclaiming, or force-closing invalidates any wrapper still
//! held by a caller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use sqlmapper_core::error::{ConnectionErrorKind, Error, Result};
use sqlmapper_core::mapping::{Connection, DataSource};
use sqlmapper_core::parsing::Properties;

use crate::state::{PoolState, PoolStatus};
use crate::unpooled::UnpooledDataSource;

/// Pool dimensions and liveness settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard cap on simultaneously checked-out connections.
    pub max_active: usize,
    /// Cap on retained idle connections.
    pub max_idle: usize,
    /// Checkout duration after which an active connection is reclaimable.
    pub max_checkout_time: Duration,
    /// Maximum time to await a returned connection before re-entering the
    /// checkout loop.
    pub time_to_wait: Duration,
    /// Additional bad-connection attempts permitted to a single requester.
    pub max_local_bad_tolerance: usize,
    pub ping_enabled: bool,
    pub ping_query: String,
    /// Idle duration after which a connection is pinged before reuse.
    pub ping_not_used_for: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 10,
            max_idle: 5,
            max_checkout_time: Duration::from_millis(20_000),
            time_to_wait: Duration::from_millis(20_000),
            max_local_bad_tolerance: 3,
            ping_enabled: false,
            ping_query: "NO PING QUERY SET".to_string(),
            ping_not_used_for: Duration::ZERO,
        }
    }
}

/// Shared wrapper state for one pooled raw connection.
///
/// The raw connection sits behind `Mutex<Option<…>>` so reclamation can move
/// it into a fresh entry while the old entry is invalidated; a caller still
/// holding the old wrapper then fails on use instead of touching a
/// connection that belongs to someone else.
pub(crate) struct ConnectionEntry {
    real: Mutex<Option<Box<dyn Connection>>>,
    valid: AtomicBool,
    created_at: Instant,
    last_used_at: Mutex<Instant>,
    checked_out_at: Mutex<Instant>,
    type_code: AtomicU64,
}

impl ConnectionEntry {
    fn new(raw: Box<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            real: Mutex::new(Some(raw)),
            valid: AtomicBool::new(true),
            created_at: now,
            last_used_at: Mutex::new(now),
            checked_out_at: Mutex::new(now),
            type_code: AtomicU64::new(0),
        }
    }

    fn adopt(raw: Box<dyn Connection>, created_at: Instant, last_used_at: Instant) -> Self {
        let entry = Self::new(raw);
        let adopted = Self {
            created_at,
            ..entry
        };
        *adopted.last_used_at.lock().expect("entry lock poisoned") = last_used_at;
        adopted
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    fn is_valid_flag(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Wrapper valid and underlying connection open.
    fn raw_usable(&self) -> bool {
        if !self.is_valid_flag() {
            return false;
        }
        self.real
            .lock()
            .expect("entry lock poisoned")
            .as_ref()
            .is_some_and(|raw| !raw.is_closed())
    }

    fn with_real<R>(
        &self,
        f: impl FnOnce(&mut Box<dyn Connection>) -> Result<R>,
    ) -> Result<R> {
        if !self.is_valid_flag() {
            return Err(invalidated());
        }
        let mut slot = self.real.lock().expect("entry lock poisoned");
        match slot.as_mut() {
            Some(raw) => f(raw),
            None => Err(invalidated()),
        }
    }

    /// Move the raw connection into a fresh entry inheriting this entry's
    /// creation and last-used timestamps; this entry becomes invalid. The
    /// raw connection is rolled back first when not in auto-commit.
    fn reclaim(&self) -> Option<Arc<ConnectionEntry>> {
        let raw = {
            let mut slot = self.real.lock().expect("entry lock poisoned");
            slot.take()
        };
        self.invalidate();
        let mut raw = raw?;
        if !raw.auto_commit() {
            if let Err(e) = raw.rollback() {
                debug!("Bad connection. Could not roll back: {}", e);
            }
        }
        Some(Arc::new(ConnectionEntry::adopt(
            raw,
            self.created_at,
            self.last_used(),
        )))
    }

    /// Roll back (when not in auto-commit), close, and invalidate.
    fn close_raw(&self) {
        let raw = {
            let mut slot = self.real.lock().expect("entry lock poisoned");
            slot.take()
        };
        self.invalidate();
        if let Some(mut raw) = raw {
            if !raw.auto_commit() {
                let _ = raw.rollback();
            }
            let _ = raw.close();
        }
    }

    fn last_used(&self) -> Instant {
        *self.last_used_at.lock().expect("entry lock poisoned")
    }

    fn touch_last_used(&self) {
        *self.last_used_at.lock().expect("entry lock poisoned") = Instant::now();
    }

    fn mark_checked_out(&self) {
        let now = Instant::now();
        *self.checked_out_at.lock().expect("entry lock poisoned") = now;
        *self.last_used_at.lock().expect("entry lock poisoned") = now;
    }

    fn checkout_elapsed(&self) -> Duration {
        self.checked_out_at
            .lock()
            .expect("entry lock poisoned")
            .elapsed()
    }

    fn idle_elapsed(&self) -> Duration {
        self.last_used().elapsed()
    }

    fn type_code(&self) -> u64 {
        self.type_code.load(Ordering::SeqCst)
    }

    fn set_type_code(&self, code: u64) {
        self.type_code.store(code, Ordering::SeqCst);
    }
}

fn invalidated() -> Error {
    Error::connection(
        ConnectionErrorKind::Invalidated,
        "Connection wrapper is invalid; it was returned to or reclaimed by the pool",
    )
}

struct PoolCore {
    data_source: UnpooledDataSource,
    config: PoolConfig,
    state: PoolState,
    expected_type_code: u64,
    closed: bool,
}

impl PoolCore {
    /// Digest of url∥user∥password, detecting credential changes.
    fn assemble_type_code(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        self.data_source.url().hash(&mut hasher);
        self.data_source.username().unwrap_or("").hash(&mut hasher);
        self.data_source.password().unwrap_or("").hash(&mut hasher);
        hasher.finish()
    }

    /// Liveness check: the raw connection must be open, and when pinging is
    /// on and the connection idled past the threshold, the ping query must
    /// succeed.
    fn is_connection_valid(&self, entry: &ConnectionEntry) -> bool {
        let mut result = entry.raw_usable();
        if result
            && self.config.ping_enabled
            && entry.idle_elapsed() > self.config.ping_not_used_for
        {
            let ping = entry.with_real(|raw| {
                raw.execute(&self.config.ping_query)?;
                if !raw.auto_commit() {
                    raw.rollback()?;
                }
                Ok(())
            });
            match ping {
                Ok(()) => debug!("Connection passed the ping check"),
                Err(e) => {
                    warn!(
                        "Execution of ping query '{}' failed: {}",
                        self.config.ping_query, e
                    );
                    entry.close_raw();
                    result = false;
                }
            }
        }
        result
    }

    /// Invalidate and close everything, then recompute the expected
    /// type-code from the current credentials.
    fn force_close_locked(&mut self) {
        self.expected_type_code = self.assemble_type_code();
        while let Some(entry) = self.state.active_connections.pop() {
            entry.close_raw();
        }
        while let Some(entry) = self.state.idle_connections.pop() {
            entry.close_raw();
        }
        debug!("Forcefully closed/removed all connections from the pool");
    }
}

struct PoolShared {
    core: Mutex<PoolCore>,
    returned: Condvar,
}

/// The pooled data source.
pub struct PooledDataSource {
    shared: Arc<PoolShared>,
}

impl PooledDataSource {
    pub fn new(data_source: UnpooledDataSource) -> Self {
        Self::with_config(data_source, PoolConfig::default())
    }

    pub fn with_config(data_source: UnpooledDataSource, config: PoolConfig) -> Self {
        let mut core = PoolCore {
            data_source,
            config,
            state: PoolState::default(),
            expected_type_code: 0,
            closed: false,
        };
        core.expected_type_code = core.assemble_type_code();
        Self {
            shared: Arc::new(PoolShared {
                core: Mutex::new(core),
                returned: Condvar::new(),
            }),
        }
    }

    /// The checkout loop: take an idle connection, grow the pool, reclaim an
    /// overdue connection, or wait for a return, until a valid connection is
    /// in hand or the bad-connection tolerance is exhausted.
    pub fn pop_connection(&self) -> Result<PooledConnection> {
        let started = Instant::now();
        let mut counted_wait = false;
        let mut local_bad_count: usize = 0;
        loop {
            let mut core = self.shared.core.lock().expect("pool lock poisoned");
            if core.closed {
                return Err(Error::connection(
                    ConnectionErrorKind::Closed,
                    "The pool has been closed",
                ));
            }
            let candidate: Option<Arc<ConnectionEntry>> = if !core
                .state
                .idle_connections
                .is_empty()
            {
                let entry = core.state.idle_connections.remove(0);
                debug!("Checked out connection from pool");
                Some(entry)
            } else if core.state.active_connections.len() < core.config.max_active {
                let raw = core.data_source.open()?;
                debug!("Created a new pooled connection");
                Some(Arc::new(ConnectionEntry::new(raw)))
            } else {
                let oldest = core.state.active_connections[0].clone();
                let checked_out = oldest.checkout_elapsed();
                if checked_out > core.config.max_checkout_time {
                    core.state.claimed_overdue_connection_count += 1;
                    core.state.accumulated_checkout_time_of_overdue_connections += checked_out;
                    core.state.accumulated_checkout_time += checked_out;
                    core.state.active_connections.remove(0);
                    match oldest.reclaim() {
                        Some(entry) => {
                            debug!("Claimed overdue connection");
                            Some(entry)
                        }
                        None => None,
                    }
                } else {
                    if !counted_wait {
                        core.state.had_to_wait_count += 1;
                        counted_wait = true;
                    }
                    debug!(
                        "Waiting as long as {:?} for a returned connection",
                        core.config.time_to_wait
                    );
                    let time_to_wait = core.config.time_to_wait;
                    let wait_started = Instant::now();
                    let (mut core, _) = self
                        .shared
                        .returned
                        .wait_timeout(core, time_to_wait)
                        .expect("pool lock poisoned");
                    core.state.accumulated_wait_time += wait_started.elapsed();
                    continue;
                }
            };
            if let Some(entry) = candidate {
                if core.is_connection_valid(&entry) {
                    entry.with_real(|raw| {
                        if !raw.auto_commit() {
                            raw.rollback()?;
                        }
                        Ok(())
                    })?;
                    entry.set_type_code(core.expected_type_code);
                    entry.mark_checked_out();
                    core.state.active_connections.push(entry.clone());
                    core.state.request_count += 1;
                    core.state.accumulated_request_time += started.elapsed();
                    return Ok(PooledConnection {
                        entry,
                        shared: Arc::clone(&self.shared),
                        returned: false,
                    });
                }
                debug!("A bad connection was returned from the pool, getting another");
                core.state.bad_connection_count += 1;
                local_bad_count += 1;
                if local_bad_count > core.config.max_idle + core.config.max_local_bad_tolerance {
                    debug!("Could not get a good connection to the database");
                    return Err(Error::connection(
                        ConnectionErrorKind::BadConnection,
                        "Could not get a good connection to the database",
                    ));
                }
            }
        }
    }

    /// Close every pooled connection and recompute the expected type-code.
    /// Called from every setter that changes credentials or pool dimensions
    /// so later returns do not recycle stale connections.
    pub fn force_close_all(&self) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.force_close_locked();
    }

    /// Mark the pool closed, close everything, and wake all waiters; their
    /// checkouts fail with a connection error.
    pub fn close(&self) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.closed = true;
        core.force_close_locked();
        drop(core);
        self.shared.returned.notify_all();
    }

    pub fn status(&self) -> PoolStatus {
        self.shared
            .core
            .lock()
            .expect("pool lock poisoned")
            .state
            .snapshot()
    }

    pub fn config(&self) -> PoolConfig {
        self.shared
            .core
            .lock()
            .expect("pool lock poisoned")
            .config
            .clone()
    }

    pub fn url(&self) -> String {
        self.shared
            .core
            .lock()
            .expect("pool lock poisoned")
            .data_source
            .url()
            .to_string()
    }

    pub fn set_driver(&self, driver: impl Into<String>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_driver(driver);
        core.force_close_locked();
    }

    pub fn set_url(&self, url: impl Into<String>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_url(url);
        core.force_close_locked();
    }

    pub fn set_username(&self, username: Option<String>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_username(username);
        core.force_close_locked();
    }

    pub fn set_password(&self, password: Option<String>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_password(password);
        core.force_close_locked();
    }

    pub fn set_default_auto_commit(&self, auto_commit: Option<bool>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_default_auto_commit(auto_commit);
        core.force_close_locked();
    }

    pub fn set_default_transaction_isolation_level(&self, level: Option<u8>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_default_transaction_isolation_level(level);
        core.force_close_locked();
    }

    pub fn set_driver_properties(&self, properties: Properties) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.data_source.set_driver_properties(properties);
        core.force_close_locked();
    }

    pub fn set_max_active(&self, max_active: usize) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.max_active = max_active;
        core.force_close_locked();
    }

    pub fn set_max_idle(&self, max_idle: usize) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.max_idle = max_idle;
        core.force_close_locked();
    }

    pub fn set_max_checkout_time(&self, max_checkout_time: Duration) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.max_checkout_time = max_checkout_time;
        core.force_close_locked();
    }

    pub fn set_time_to_wait(&self, time_to_wait: Duration) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.time_to_wait = time_to_wait;
        core.force_close_locked();
    }

    /// A per-requester tolerance only; no force close.
    pub fn set_max_local_bad_tolerance(&self, tolerance: usize) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.max_local_bad_tolerance = tolerance;
    }

    pub fn set_ping_query(&self, ping_query: impl Into<String>) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.ping_query = ping_query.into();
        core.force_close_locked();
    }

    pub fn set_ping_enabled(&self, ping_enabled: bool) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.ping_enabled = ping_enabled;
        core.force_close_locked();
    }

    pub fn set_ping_not_used_for(&self, threshold: Duration) {
        let mut core = self.shared.core.lock().expect("pool lock poisoned");
        core.config.ping_not_used_for = threshold;
        core.force_close_locked();
    }
}

impl DataSource for PooledDataSource {
    fn connection(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(self.pop_connection()?))
    }
}

fn push_connection(shared: &PoolShared, entry: &Arc<ConnectionEntry>) {
    let mut core = shared.core.lock().expect("pool lock poisoned");
    if let Some(position) = core
        .state
        .active_connections
        .iter()
        .position(|active| Arc::ptr_eq(active, entry))
    {
        core.state.active_connections.remove(position);
    }
    if core.is_connection_valid(entry) {
        if core.state.idle_connections.len() < core.config.max_idle
            && entry.type_code() == core.expected_type_code
            && !core.closed
        {
            core.state.accumulated_checkout_time += entry.checkout_elapsed();
            match entry.reclaim() {
                Some(fresh) => {
                    core.state.idle_connections.push(fresh);
                    debug!("Returned connection to pool");
                    drop(core);
                    shared.returned.notify_one();
                }
                None => {
                    core.state.bad_connection_count += 1;
                }
            }
        } else {
            core.state.accumulated_checkout_time += entry.checkout_elapsed();
            entry.close_raw();
            debug!("Closed connection on return");
        }
    } else {
        debug!("A bad connection attempted to return to the pool, discarding");
        core.state.bad_connection_count += 1;
    }
}

/// A checked-out connection. Dropping (or closing) it returns the raw
/// connection to the pool; a wrapper that was reclaimed or force-closed
/// fails on every use.
pub struct PooledConnection {
    entry: Arc<ConnectionEntry>,
    shared: Arc<PoolShared>,
    returned: bool,
}

impl Connection for PooledConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.entry.with_real(|raw| raw.execute(sql))?;
        self.entry.touch_last_used();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.entry.with_real(|raw| raw.commit())
    }

    fn rollback(&mut self) -> Result<()> {
        self.entry.with_real(|raw| raw.rollback())
    }

    fn close(&mut self) -> Result<()> {
        if !self.returned {
            self.returned = true;
            push_connection(&self.shared, &self.entry);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.returned || !self.entry.raw_usable()
    }

    fn auto_commit(&self) -> bool {
        self.entry
            .with_real(|raw| Ok(raw.auto_commit()))
            .unwrap_or(true)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.entry.with_real(|raw| raw.set_auto_commit(auto_commit))
    }

    fn product_name(&self) -> String {
        self.entry
            .with_real(|raw| Ok(raw.product_name()))
            .unwrap_or_default()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.returned {
            self.returned = true;
            push_connection(&self.shared, &self.entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestDriver, TestDriverOptions};
    use crate::unpooled::DriverRegistry;

    fn pool_with(
        options: TestDriverOptions,
        config: PoolConfig,
    ) -> (Arc<TestDriver>, PooledDataSource) {
        let driver = TestDriver::shared(options);
        let mut registry = DriverRegistry::new();
        registry.register("test", driver.clone());
        let source = UnpooledDataSource::new(Arc::new(registry), "test", "test://db")
            .credentials("root", "secret");
        (driver, PooledDataSource::with_config(source, config))
    }

    #[test]
    fn returned_connections_are_reused() {
        let (driver, pool) = pool_with(TestDriverOptions::default(), PoolConfig::default());
        let conn = pool.pop_connection().unwrap();
        drop(conn);
        let _conn = pool.pop_connection().unwrap();
        assert_eq!(driver.opened_count(), 1);
        let status = pool.status();
        assert_eq!(status.request_count, 2);
        assert_eq!(status.active_connections, 1);
        assert_eq!(status.idle_connections, 0);
    }

    #[test]
    fn pool_conservation_invariant() {
        let config = PoolConfig {
            max_active: 4,
            max_idle: 2,
            ..PoolConfig::default()
        };
        let (_, pool) = pool_with(TestDriverOptions::default(), config);
        let connections: Vec<_> = (0..4).map(|_| pool.pop_connection().unwrap()).collect();
        let status = pool.status();
        assert_eq!(status.active_connections, 4);
        drop(connections);
        let status = pool.status();
        assert!(status.active_connections + status.idle_connections <= 4);
        assert!(status.idle_connections <= 2);
    }

    #[test]
    fn overdue_connection_is_reclaimed_and_old_wrapper_fails() {
        let config = PoolConfig {
            max_active: 1,
            max_checkout_time: Duration::from_millis(50),
            time_to_wait: Duration::from_millis(100),
            ..PoolConfig::default()
        };
        let (driver, pool) = pool_with(TestDriverOptions::default(), config);
        let mut first = pool.pop_connection().unwrap();
        std::thread::sleep(Duration::from_millis(60));
        let mut second = pool.pop_connection().unwrap();
        // the raw connection moved to the new wrapper without reopening
        assert_eq!(driver.opened_count(), 1);
        assert_eq!(pool.status().claimed_overdue_connection_count, 1);
        second.execute("SELECT 1").unwrap();
        let err = first.execute("SELECT 1").unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn waiter_is_woken_by_return() {
        let config = PoolConfig {
            max_active: 1,
            time_to_wait: Duration::from_millis(5_000),
            ..PoolConfig::default()
        };
        let (_, pool) = pool_with(TestDriverOptions::default(), config);
        let pool = Arc::new(pool);
        let held = pool.pop_connection().unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let started = Instant::now();
                let conn = pool.pop_connection().unwrap();
                (started.elapsed(), conn)
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        drop(held);
        let (waited, _conn) = waiter.join().unwrap();
        assert!(waited < Duration::from_millis(4_000));
        assert_eq!(pool.status().had_to_wait_count, 1);
    }

    #[test]
    fn pool_liveness_under_contention() {
        let config = PoolConfig {
            max_active: 2,
            max_idle: 2,
            time_to_wait: Duration::from_millis(2_000),
            ..PoolConfig::default()
        };
        let (_, pool) = pool_with(TestDriverOptions::default(), config);
        let pool = Arc::new(pool);
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let mut conn = pool.pop_connection().expect("checkout must not fail");
                        conn.execute("SELECT 1").unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let status = pool.status();
        assert_eq!(status.request_count, 100);
        assert!(status.active_connections == 0);
    }

    #[test]
    fn bad_connections_exhaust_local_tolerance() {
        let options = TestDriverOptions {
            closed_on_open: true,
            ..TestDriverOptions::default()
        };
        let config = PoolConfig {
            max_idle: 2,
            max_local_bad_tolerance: 1,
            ..PoolConfig::default()
        };
        let (_, pool) = pool_with(options, config);
        let err = match pool.pop_connection() {
            Err(e) => e,
            Ok(_) => panic!("expected pop_connection to fail"),
        };
        assert!(err.is_connection_error());
        // max_idle + tolerance + 1 attempts were counted as bad
        assert_eq!(pool.status().bad_connection_count, 4);
    }

    #[test]
    fn failed_ping_discards_the_idle_connection() {
        let options = TestDriverOptions {
            fail_execute_containing: Some("PING".to_string()),
            ..TestDriverOptions::default()
        };
        let config = PoolConfig {
            ping_enabled: true,
            ping_query: "SELECT PING".to_string(),
            ping_not_used_for: Duration::ZERO,
            ..PoolConfig::default()
        };
        let (driver, pool) = pool_with(options, config);
        let conn = pool.pop_connection().unwrap();
        drop(conn);
        std::thread::sleep(Duration::from_millis(5));
        let _conn = pool.pop_connection().unwrap();
        // the idle connection failed its ping and a new one was opened
        assert_eq!(driver.opened_count(), 2);
        assert_eq!(pool.status().bad_connection_count, 1);
    }

    #[test]
    fn credential_change_force_closes_and_invalidates() {
        let (driver, pool) = pool_with(TestDriverOptions::default(), PoolConfig::default());
        let mut held = pool.pop_connection().unwrap();
        let spare = pool.pop_connection().unwrap();
        drop(spare);
        assert_eq!(pool.status().idle_connections, 1);
        pool.set_username(Some("other".to_string()));
        assert_eq!(pool.status().idle_connections, 0);
        assert_eq!(pool.status().active_connections, 0);
        assert!(held.execute("SELECT 1").is_err());
        let _fresh = pool.pop_connection().unwrap();
        assert_eq!(driver.opened_count(), 3);
        assert_eq!(driver.last_properties().get("user"), Some("other"));
    }

    #[test]
    fn close_wakes_waiters_with_an_error() {
        let config = PoolConfig {
            max_active: 1,
            time_to_wait: Duration::from_millis(5_000),
            ..PoolConfig::default()
        };
        let (_, pool) = pool_with(TestDriverOptions::default(), config);
        let pool = Arc::new(pool);
        let _held = pool.pop_connection().unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.pop_connection())
        };
        std::thread::sleep(Duration::from_millis(50));
        pool.close();
        let result = waiter.join().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn ping_is_skipped_for_recently_used_connections() {
        let options = TestDriverOptions {
            fail_execute_containing: Some("PING".to_string()),
            ..TestDriverOptions::default()
        };
        let config = PoolConfig {
            ping_enabled: true,
            ping_query: "SELECT PING".to_string(),
            ping_not_used_for: Duration::from_millis(10_000),
            ..PoolConfig::default()
        };
        let (driver, pool) = pool_with(options, config);
        let conn = pool.pop_connection().unwrap();
        drop(conn);
        let _conn = pool.pop_connection().unwrap();
        // idle time below the threshold: no ping, connection reused
        assert_eq!(driver.opened_count(), 1);
    }
}
