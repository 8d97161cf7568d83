//! Cache decorators layered by the [`CacheBuilder`](crate::cache::CacheBuilder).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::cache::{Cache, CacheKey};
use crate::error::{Error, Result};
use crate::value::Value;

/// Least-recently-used eviction. Tracks access order; `size` bounds the
/// number of retained entries (default 1024).
pub struct LruCache {
    delegate: Box<dyn Cache>,
    order: Mutex<VecDeque<CacheKey>>,
    size: AtomicUsize,
}

impl LruCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            order: Mutex::new(VecDeque::new()),
            size: AtomicUsize::new(1024),
        }
    }

    fn touch(&self, key: &CacheKey) {
        let mut order = self.order.lock().expect("lru lock poisoned");
        if let Some(position) = order.iter().position(|k| k == key) {
            order.remove(position);
            order.push_back(*key);
        }
    }

    fn record_and_evict(&self, key: CacheKey) {
        let mut order = self.order.lock().expect("lru lock poisoned");
        if let Some(position) = order.iter().position(|k| k == &key) {
            order.remove(position);
        }
        order.push_back(key);
        let limit = self.size.load(Ordering::Relaxed);
        while order.len() > limit {
            if let Some(oldest) = order.pop_front() {
                self.delegate.remove(&oldest);
            }
        }
    }
}

impl Cache for LruCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.delegate.put(key, value);
        self.record_and_evict(key);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.touch(key);
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) {
        let mut order = self.order.lock().expect("lru lock poisoned");
        if let Some(position) = order.iter().position(|k| k == key) {
            order.remove(position);
        }
        drop(order);
        self.delegate.remove(key);
    }

    fn clear(&self) {
        self.order.lock().expect("lru lock poisoned").clear();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        if name == "size" {
            let parsed: usize = value.parse().map_err(|_| {
                Error::builder(format!(
                    "Cache property 'size' must be an integer, found '{}'",
                    value
                ))
            })?;
            self.size.store(parsed, Ordering::Relaxed);
            return Ok(true);
        }
        self.delegate.apply_property(name, value)
    }
}

/// First-in-first-out eviction.
pub struct FifoCache {
    delegate: Box<dyn Cache>,
    order: Mutex<VecDeque<CacheKey>>,
    size: AtomicUsize,
}

impl FifoCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            order: Mutex::new(VecDeque::new()),
            size: AtomicUsize::new(1024),
        }
    }
}

impl Cache for FifoCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.delegate.put(key, value);
        let mut order = self.order.lock().expect("fifo lock poisoned");
        if !order.contains(&key) {
            order.push_back(key);
        }
        let limit = self.size.load(Ordering::Relaxed);
        while order.len() > limit {
            if let Some(oldest) = order.pop_front() {
                self.delegate.remove(&oldest);
            }
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) {
        let mut order = self.order.lock().expect("fifo lock poisoned");
        if let Some(position) = order.iter().position(|k| k == key) {
            order.remove(position);
        }
        drop(order);
        self.delegate.remove(key);
    }

    fn clear(&self) {
        self.order.lock().expect("fifo lock poisoned").clear();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        if name == "size" {
            let parsed: usize = value.parse().map_err(|_| {
                Error::builder(format!(
                    "Cache property 'size' must be an integer, found '{}'",
                    value
                ))
            })?;
            self.size.store(parsed, Ordering::Relaxed);
            return Ok(true);
        }
        self.delegate.apply_property(name, value)
    }
}

/// Clears the delegate when the configured interval has elapsed since the
/// last flush.
pub struct ScheduledCache {
    delegate: Box<dyn Cache>,
    clear_interval: Duration,
    last_clear: Mutex<Instant>,
}

impl ScheduledCache {
    pub fn new(delegate: Box<dyn Cache>, clear_interval: Duration) -> Self {
        Self {
            delegate,
            clear_interval,
            last_clear: Mutex::new(Instant::now()),
        }
    }

    fn clear_when_stale(&self) {
        let mut last_clear = self.last_clear.lock().expect("scheduled lock poisoned");
        if last_clear.elapsed() > self.clear_interval {
            *last_clear = Instant::now();
            drop(last_clear);
            self.delegate.clear();
        }
    }
}

impl Cache for ScheduledCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.clear_when_stale();
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.clear_when_stale();
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) {
        self.clear_when_stale();
        self.delegate.remove(key);
    }

    fn clear(&self) {
        *self.last_clear.lock().expect("scheduled lock poisoned") = Instant::now();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.clear_when_stale();
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        self.delegate.apply_property(name, value)
    }
}

/// Serializes compound operations on the delegate behind one mutex.
pub struct SynchronizedCache {
    delegate: Box<dyn Cache>,
    lock: Mutex<()>,
}

impl SynchronizedCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            lock: Mutex::new(()),
        }
    }
}

impl Cache for SynchronizedCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        let _guard = self.lock.lock().expect("sync cache lock poisoned");
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        let _guard = self.lock.lock().expect("sync cache lock poisoned");
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) {
        let _guard = self.lock.lock().expect("sync cache lock poisoned");
        self.delegate.remove(key);
    }

    fn clear(&self) {
        let _guard = self.lock.lock().expect("sync cache lock poisoned");
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        let _guard = self.lock.lock().expect("sync cache lock poisoned");
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        self.delegate.apply_property(name, value)
    }
}

/// Tracks the hit ratio and reports it at debug level.
pub struct LoggingCache {
    delegate: Box<dyn Cache>,
    requests: AtomicUsize,
    hits: AtomicUsize,
}

impl LoggingCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            requests: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn hit_ratio(&self) -> f64 {
        let requests = self.requests.load(Ordering::Relaxed);
        if requests == 0 {
            return 0.0;
        }
        self.hits.load(Ordering::Relaxed) as f64 / requests as f64
    }
}

impl Cache for LoggingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let found = self.delegate.get(key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            "Cache hit ratio [{}]: {:.2}",
            self.delegate.id(),
            self.hit_ratio()
        );
        found
    }

    fn remove(&self, key: &CacheKey) {
        self.delegate.remove(key);
    }

    fn clear(&self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        self.delegate.apply_property(name, value)
    }
}

/// Stores a serialized copy of every value so readers receive independent
/// instances.
pub struct SerializedCache {
    delegate: Box<dyn Cache>,
}

impl SerializedCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self { delegate }
    }
}

impl Cache for SerializedCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        match serde_json::to_string(&value) {
            Ok(encoded) => self.delegate.put(key, Value::Text(encoded)),
            Err(e) => warn!(
                "Could not serialize value for cache [{}]: {}",
                self.delegate.id(),
                e
            ),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.delegate.get(key)? {
            Value::Text(encoded) => serde_json::from_str(&encoded).ok(),
            other => Some(other),
        }
    }

    fn remove(&self, key: &CacheKey) {
        self.delegate.remove(key);
    }

    fn clear(&self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        self.delegate.apply_property(name, value)
    }
}

/// Blocks concurrent readers of a missing key until one of them publishes a
/// value, bounding the stampede on expensive misses.
pub struct BlockingCache {
    delegate: Box<dyn Cache>,
    timeout: Option<Duration>,
    locks: Mutex<HashMap<CacheKey, bool>>,
    released: Condvar,
}

impl BlockingCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            timeout: None,
            locks: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn acquire(&self, key: &CacheKey) {
        let mut locks = self.locks.lock().expect("blocking cache lock poisoned");
        loop {
            if !locks.get(key).copied().unwrap_or(false) {
                locks.insert(*key, true);
                return;
            }
            locks = match self.timeout {
                Some(timeout) => {
                    let (guard, result) = self
                        .released
                        .wait_timeout(locks, timeout)
                        .expect("blocking cache lock poisoned");
                    if result.timed_out() {
                        warn!(
                            "Timed out waiting for cache lock on key {} in [{}]",
                            key,
                            self.delegate.id()
                        );
                    }
                    guard
                }
                None => self
                    .released
                    .wait(locks)
                    .expect("blocking cache lock poisoned"),
            };
        }
    }

    fn release(&self, key: &CacheKey) {
        let mut locks = self.locks.lock().expect("blocking cache lock poisoned");
        locks.remove(key);
        self.released.notify_all();
    }
}

impl Cache for BlockingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.delegate.put(key, value);
        self.release(&key);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.acquire(key);
        let found = self.delegate.get(key);
        if found.is_some() {
            self.release(key);
        }
        found
    }

    fn remove(&self, key: &CacheKey) {
        // releases the latch without evicting, letting a blocked reader
        // proceed to recompute
        self.release(key);
    }

    fn clear(&self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn apply_property(&mut self, name: &str, value: &str) -> Result<bool> {
        self.delegate.apply_property(name, value)
    }
}
