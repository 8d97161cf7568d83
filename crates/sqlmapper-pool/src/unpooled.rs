//! Driver registry and the unpooled data source.

use std::collections::HashMap;
use std::sync::Arc;

use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::{Connection, DataSource};
use sqlmapper_core::parsing::Properties;

/// Opens raw connections for one database driver.
pub trait Driver: Send + Sync {
    fn connect(&self, url: &str, properties: &Properties) -> Result<Box<dyn Connection>>;
}

/// Explicit driver registry: drivers are registered by name and looked up
/// when a data source opens its first connection. There is no global
/// registry; the instance travels with the configuration that owns it.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.into(), driver);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers.get(name).cloned().ok_or_else(|| {
            Error::connection(
                sqlmapper_core::error::ConnectionErrorKind::Driver,
                format!("No driver registered under '{}'", name),
            )
        })
    }
}

/// Opens a fresh raw connection per request.
#[derive(Clone)]
pub struct UnpooledDataSource {
    registry: Arc<DriverRegistry>,
    driver: String,
    url: String,
    username: Option<String>,
    password: Option<String>,
    driver_properties: Properties,
    default_auto_commit: Option<bool>,
    default_transaction_isolation_level: Option<u8>,
}

impl UnpooledDataSource {
    pub fn new(registry: Arc<DriverRegistry>, driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            registry,
            driver: driver.into(),
            url: url.into(),
            username: None,
            password: None,
            driver_properties: Properties::new(),
            default_auto_commit: None,
            default_transaction_isolation_level: None,
        }
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn set_driver(&mut self, driver: impl Into<String>) {
        self.driver = driver.into();
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    pub fn driver_properties(&self) -> &Properties {
        &self.driver_properties
    }

    pub fn set_driver_properties(&mut self, properties: Properties) {
        self.driver_properties = properties;
    }

    pub fn default_auto_commit(&self) -> Option<bool> {
        self.default_auto_commit
    }

    pub fn set_default_auto_commit(&mut self, auto_commit: Option<bool>) {
        self.default_auto_commit = auto_commit;
    }

    pub fn default_transaction_isolation_level(&self) -> Option<u8> {
        self.default_transaction_isolation_level
    }

    pub fn set_default_transaction_isolation_level(&mut self, level: Option<u8>) {
        self.default_transaction_isolation_level = level;
    }

    /// Open a raw connection, applying credentials, driver properties, and
    /// the configured session defaults.
    pub fn open(&self) -> Result<Box<dyn Connection>> {
        let driver = self.registry.get(&self.driver)?;
        let mut properties = self.driver_properties.clone();
        if let Some(username) = &self.username {
            properties.set("user", username.clone());
        }
        if let Some(password) = &self.password {
            properties.set("password", password.clone());
        }
        if let Some(level) = self.default_transaction_isolation_level {
            properties.set("transactionIsolation", level.to_string());
        }
        let mut connection = driver.connect(&self.url, &properties)?;
        if let Some(auto_commit) = self.default_auto_commit {
            if auto_commit != connection.auto_commit() {
                connection.set_auto_commit(auto_commit)?;
            }
        }
        Ok(connection)
    }
}

impl DataSource for UnpooledDataSource {
    fn connection(&self) -> Result<Box<dyn Connection>> {
        self.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestDriver, TestDriverOptions};

    #[test]
    fn open_applies_credentials_and_defaults() {
        let driver = Arc::new(TestDriver::new(TestDriverOptions::default()));
        let mut registry = DriverRegistry::new();
        registry.register("test", driver.clone());
        let source = UnpooledDataSource::new(Arc::new(registry), "test", "test://db")
            .credentials("root", "secret");
        let connection = source.open().unwrap();
        assert!(!connection.is_closed());
        let last = driver.last_properties();
        assert_eq!(last.get("user"), Some("root"));
        assert_eq!(last.get("password"), Some("secret"));
    }

    #[test]
    fn missing_driver_is_a_connection_error() {
        let source =
            UnpooledDataSource::new(Arc::new(DriverRegistry::new()), "absent", "test://db");
        assert!(source.open().is_err());
    }
}
