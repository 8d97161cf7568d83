//! Pool bookkeeping.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::pooled::ConnectionEntry;

/// Counters plus the idle/active partitions, guarded by the pool lock.
#[derive(Default)]
pub struct PoolState {
    pub request_count: u64,
    pub accumulated_request_time: Duration,
    pub accumulated_checkout_time: Duration,
    pub claimed_overdue_connection_count: u64,
    pub accumulated_checkout_time_of_overdue_connections: Duration,
    pub accumulated_wait_time: Duration,
    pub had_to_wait_count: u64,
    pub bad_connection_count: u64,
    pub(crate) idle_connections: Vec<Arc<ConnectionEntry>>,
    pub(crate) active_connections: Vec<Arc<ConnectionEntry>>,
}

impl PoolState {
    pub fn idle_count(&self) -> usize {
        self.idle_connections.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_connections.len()
    }

    pub fn average_request_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::ZERO
        } else {
            self.accumulated_request_time / self.request_count as u32
        }
    }

    pub fn average_wait_time(&self) -> Duration {
        if self.had_to_wait_count == 0 {
            Duration::ZERO
        } else {
            self.accumulated_wait_time / self.had_to_wait_count as u32
        }
    }

    pub(crate) fn snapshot(&self) -> PoolStatus {
        PoolStatus {
            request_count: self.request_count,
            accumulated_request_time: self.accumulated_request_time,
            accumulated_checkout_time: self.accumulated_checkout_time,
            claimed_overdue_connection_count: self.claimed_overdue_connection_count,
            accumulated_checkout_time_of_overdue_connections: self
                .accumulated_checkout_time_of_overdue_connections,
            accumulated_wait_time: self.accumulated_wait_time,
            had_to_wait_count: self.had_to_wait_count,
            bad_connection_count: self.bad_connection_count,
            idle_connections: self.idle_connections.len(),
            active_connections: self.active_connections.len(),
        }
    }
}

/// A point-in-time copy of the pool counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub request_count: u64,
    pub accumulated_request_time: Duration,
    pub accumulated_checkout_time: Duration,
    pub claimed_overdue_connection_count: u64,
    pub accumulated_checkout_time_of_overdue_connections: Duration,
    pub accumulated_wait_time: Duration,
    pub had_to_wait_count: u64,
    pub bad_connection_count: u64,
    pub idle_connections: usize,
    pub active_connections: usize,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- pool status ---")?;
        writeln!(f, " requests                {}", self.request_count)?;
        writeln!(
            f,
            " accumulated request time {:?}",
            self.accumulated_request_time
        )?;
        writeln!(f, " had to wait             {}", self.had_to_wait_count)?;
        writeln!(f, " bad connections         {}", self.bad_connection_count)?;
        writeln!(
            f,
            " claimed overdue          {}",
            self.claimed_overdue_connection_count
        )?;
        writeln!(f, " idle connections        {}", self.idle_connections)?;
        write!(f, " active connections      {}", self.active_connections)
    }
}
