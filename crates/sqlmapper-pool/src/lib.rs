//! Data sources for sqlmapper: an unpooled per-request source and a
//! bounded, synchronous connection pool with idle/active partitioning,
//! overdue checkout reclamation, optional liveness pings, and bad-connection
//! tolerance.

pub mod factory;
pub mod pooled;
pub mod state;
pub mod testing;
pub mod unpooled;

pub use factory::{DataSourceFactory, PooledDataSourceFactory, UnpooledDataSourceFactory};
pub use pooled::{PoolConfig, PooledConnection, PooledDataSource};
pub use state::{PoolState, PoolStatus};
pub use unpooled::{Driver, DriverRegistry, UnpooledDataSource};
