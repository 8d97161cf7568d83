//! In-memory driver for tests and examples.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::Connection;
use sqlmapper_core::parsing::Properties;

use crate::unpooled::Driver;

/// Behavior knobs for [`TestDriver`].
#[derive(Debug, Clone)]
pub struct TestDriverOptions {
    /// Reported database product name.
    pub product_name: String,
    /// Fresh connections start in this auto-commit mode.
    pub auto_commit: bool,
    /// Every connect call fails.
    pub fail_connections: bool,
    /// Connections come back already closed (and therefore invalid).
    pub closed_on_open: bool,
    /// Statements containing this fragment fail to execute.
    pub fail_execute_containing: Option<String>,
}

impl Default for TestDriverOptions {
    fn default() -> Self {
        Self {
            product_name: "TestDB".to_string(),
            auto_commit: true,
            fail_connections: false,
            closed_on_open: false,
            fail_execute_containing: None,
        }
    }
}

/// A driver producing scripted in-memory connections.
pub struct TestDriver {
    options: Mutex<TestDriverOptions>,
    opened: AtomicUsize,
    last_properties: Mutex<Properties>,
}

impl TestDriver {
    pub fn new(options: TestDriverOptions) -> Self {
        Self {
            options: Mutex::new(options),
            opened: AtomicUsize::new(0),
            last_properties: Mutex::new(Properties::new()),
        }
    }

    pub fn shared(options: TestDriverOptions) -> Arc<Self> {
        Arc::new(Self::new(options))
    }

    /// Number of successfully opened connections.
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Properties supplied to the latest connect call.
    pub fn last_properties(&self) -> Properties {
        self.last_properties.lock().expect("driver lock poisoned").clone()
    }

    pub fn update_options(&self, update: impl FnOnce(&mut TestDriverOptions)) {
        update(&mut self.options.lock().expect("driver lock poisoned"));
    }
}

impl Driver for TestDriver {
    fn connect(&self, url: &str, properties: &Properties) -> Result<Box<dyn Connection>> {
        let options = self.options.lock().expect("driver lock poisoned").clone();
        *self.last_properties.lock().expect("driver lock poisoned") = properties.clone();
        if options.fail_connections {
            return Err(Error::connection(
                sqlmapper_core::error::ConnectionErrorKind::Driver,
                format!("Scripted connect failure for '{}'", url),
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestConnection {
            closed: options.closed_on_open,
            auto_commit: options.auto_commit,
            product_name: options.product_name,
            fail_execute_containing: options.fail_execute_containing,
            executed: Vec::new(),
            rollback_count: 0,
        }))
    }
}

/// The scripted connection handed out by [`TestDriver`].
pub struct TestConnection {
    closed: bool,
    auto_commit: bool,
    product_name: String,
    fail_execute_containing: Option<String>,
    pub executed: Vec<String>,
    pub rollback_count: usize,
}

impl Connection for TestConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        if self.closed {
            return Err(Error::connection(
                sqlmapper_core::error::ConnectionErrorKind::Driver,
                "Connection is closed",
            ));
        }
        if let Some(fragment) = &self.fail_execute_containing {
            if sql.contains(fragment.as_str()) {
                return Err(Error::connection(
                    sqlmapper_core::error::ConnectionErrorKind::Driver,
                    format!("Scripted failure executing '{}'", sql),
                ));
            }
        }
        self.executed.push(sql.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.rollback_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn product_name(&self) -> String {
        self.product_name.clone()
    }
}
