//! Namespace caches: base implementation, decorators, and the declarative
//! chain builder.

pub mod decorators;
pub mod perpetual;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::parsing::Properties;
use crate::value::Value;

pub use decorators::{
    BlockingCache, FifoCache, LoggingCache, LruCache, ScheduledCache, SerializedCache,
    SynchronizedCache,
};
pub use perpetual::PerpetualCache;

/// A composite cache key accumulated from the hash of each update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CacheKey {
    hash: u64,
    count: u32,
}

impl CacheKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one component into the key.
    pub fn update<T: Hash>(&mut self, part: T) {
        let mut hasher = DefaultHasher::new();
        part.hash(&mut hasher);
        self.hash = self.hash.wrapping_mul(37).wrapping_add(hasher.finish());
        self.count += 1;
    }

    pub fn of<T: Hash>(part: T) -> Self {
        let mut key = Self::new();
        key.update(part);
        key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:x}", self.count, self.hash)
    }
}

/// A namespace cache. Implementations use interior mutability so a built
/// chain can be shared as `Arc<dyn Cache>`.
pub trait Cache: Send + Sync {
    /// The namespace this cache belongs to.
    fn id(&self) -> &str;

    fn put(&self, key: CacheKey, value: Value);

    fn get(&self, key: &CacheKey) -> Option<Value>;

    fn remove(&self, key: &CacheKey);

    fn clear(&self);

    fn size(&self) -> usize;

    /// Capability probe for declarative configuration: return `Ok(true)`
    /// when the property is recognized and applied (after type coercion).
    /// Decorators forward unrecognized keys to their delegate.
    fn apply_property(&mut self, _name: &str, _value: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Assembles a decorator chain around a base implementation:
/// base → eviction → scheduled-flush → synchronized → logging → serialized →
/// blocking, with the optional layers controlled by the builder flags.
pub struct CacheBuilder {
    id: String,
    implementation: Option<String>,
    eviction: Option<String>,
    clear_interval: Option<Duration>,
    size: Option<usize>,
    read_write: bool,
    blocking: bool,
    logging: bool,
    properties: Properties,
}

impl CacheBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            implementation: None,
            eviction: None,
            clear_interval: None,
            size: None,
            read_write: true,
            blocking: false,
            logging: true,
            properties: Properties::new(),
        }
    }

    pub fn implementation(mut self, alias: impl Into<String>) -> Self {
        self.implementation = Some(alias.into());
        self
    }

    pub fn eviction(mut self, alias: impl Into<String>) -> Self {
        self.eviction = Some(alias.into());
        self
    }

    pub fn clear_interval(mut self, interval: Option<Duration>) -> Self {
        self.clear_interval = interval;
        self
    }

    pub fn size(mut self, size: Option<usize>) -> Self {
        self.size = size;
        self
    }

    pub fn read_write(mut self, read_write: bool) -> Self {
        self.read_write = read_write;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn build(self) -> Result<Box<dyn Cache>> {
        let implementation = self.implementation.as_deref().unwrap_or("PERPETUAL");
        let mut cache: Box<dyn Cache> = match implementation {
            "PERPETUAL" => Box::new(PerpetualCache::new(self.id.clone())),
            other => {
                return Err(Error::builder(format!(
                    "Unknown cache implementation '{}' for namespace '{}'",
                    other, self.id
                )));
            }
        };
        apply_properties(cache.as_mut(), &self.properties)?;

        let eviction = self.eviction.as_deref().unwrap_or("LRU");
        let mut cache: Box<dyn Cache> = match eviction {
            "LRU" => Box::new(LruCache::new(cache)),
            "FIFO" => Box::new(FifoCache::new(cache)),
            other => {
                return Err(Error::builder(format!(
                    "Unknown cache eviction policy '{}' for namespace '{}'",
                    other, self.id
                )));
            }
        };
        if let Some(size) = self.size {
            cache.apply_property("size", &size.to_string())?;
        }
        apply_properties(cache.as_mut(), &self.properties)?;

        let mut cache: Box<dyn Cache> = match self.clear_interval {
            Some(interval) => Box::new(ScheduledCache::new(cache, interval)),
            None => cache,
        };
        cache = Box::new(SynchronizedCache::new(cache));
        if self.logging {
            cache = Box::new(LoggingCache::new(cache));
        }
        if !self.read_write {
            cache = Box::new(SerializedCache::new(cache));
        }
        if self.blocking {
            cache = Box::new(BlockingCache::new(cache));
        }
        Ok(cache)
    }
}

fn apply_properties(cache: &mut dyn Cache, properties: &Properties) -> Result<()> {
    for (name, value) in properties.iter() {
        cache.apply_property(name, value)?;
    }
    Ok(())
}
