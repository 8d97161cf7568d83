//! Environments and the data-source seam.
//!
//! Drivers, wire protocols, and statement execution are external
//! collaborators. The core sees them through the [`Connection`] and
//! [`DataSource`] traits; the pool crate provides the standard
//! implementations.

use std::sync::Arc;

use crate::error::Result;
use crate::parsing::Properties;

/// A raw database connection as the mapping core needs to see it.
pub trait Connection: Send {
    /// Execute a statement, discarding any result rows.
    fn execute(&mut self, sql: &str) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;

    fn auto_commit(&self) -> bool;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    /// Database product name, for vendor-based database-id resolution.
    fn product_name(&self) -> String;
}

/// Hands out connections.
pub trait DataSource: Send + Sync {
    fn connection(&self) -> Result<Box<dyn Connection>>;
}

/// Transaction manager selection recorded from the environment document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionManagerType {
    /// Commit/rollback driven through the connection.
    Jdbc,
    /// An external container manages the transaction boundary.
    Managed,
}

impl TransactionManagerType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "JDBC" => Some(TransactionManagerType::Jdbc),
            "MANAGED" => Some(TransactionManagerType::Managed),
            _ => None,
        }
    }
}

/// One configured environment: id, transaction discipline, data source.
#[derive(Clone)]
pub struct Environment {
    pub id: String,
    pub transaction_manager: TransactionManagerType,
    pub data_source: Arc<dyn DataSource>,
}

impl Environment {
    pub fn new(
        id: impl Into<String>,
        transaction_manager: TransactionManagerType,
        data_source: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            id: id.into(),
            transaction_manager,
            data_source,
        }
    }
}

/// Maps database product names to configured database ids.
///
/// With properties configured, the first property whose key occurs in the
/// reported product name supplies the id; without properties the product
/// name itself is the id.
#[derive(Debug, Clone, Default)]
pub struct VendorDatabaseIdProvider {
    properties: Properties,
}

impl VendorDatabaseIdProvider {
    pub fn new(properties: Properties) -> Self {
        Self { properties }
    }

    pub fn database_id(&self, data_source: &dyn DataSource) -> Result<Option<String>> {
        let mut connection = data_source.connection()?;
        let product = connection.product_name();
        let _ = connection.close();
        if self.properties.is_empty() {
            return Ok(Some(product));
        }
        for (key, value) in self.properties.iter() {
            if product.contains(key) {
                return Ok(Some(value.to_string()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FakeConnection {
        closed: bool,
    }

    impl Connection for FakeConnection {
        fn execute(&mut self, _sql: &str) -> Result<()> {
            Ok(())
        }
        fn commit(&mut self) -> Result<()> {
            Ok(())
        }
        fn rollback(&mut self) -> Result<()> {
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
            true
        }
        fn set_auto_commit(&mut self, _auto_commit: bool) -> Result<()> {
            Ok(())
        }
        fn product_name(&self) -> String {
            "TestDB Server 12".to_string()
        }
    }

    struct FakeDataSource;

    impl DataSource for FakeDataSource {
        fn connection(&self) -> Result<Box<dyn Connection>> {
            Ok(Box::new(FakeConnection { closed: false }))
        }
    }

    struct BrokenDataSource;

    impl DataSource for BrokenDataSource {
        fn connection(&self) -> Result<Box<dyn Connection>> {
            Err(Error::connection(
                crate::error::ConnectionErrorKind::Driver,
                "no driver",
            ))
        }
    }

    #[test]
    fn vendor_provider_matches_substring() {
        let provider = VendorDatabaseIdProvider::new(
            Properties::new()
                .with("TestDB", "testdb")
                .with("OtherDB", "other"),
        );
        assert_eq!(
            provider.database_id(&FakeDataSource).unwrap().as_deref(),
            Some("testdb")
        );
    }

    #[test]
    fn vendor_provider_without_properties_reports_product_name() {
        let provider = VendorDatabaseIdProvider::default();
        assert_eq!(
            provider.database_id(&FakeDataSource).unwrap().as_deref(),
            Some("TestDB Server 12")
        );
    }

    #[test]
    fn vendor_provider_propagates_connection_failure() {
        let provider = VendorDatabaseIdProvider::default();
        assert!(provider.database_id(&BrokenDataSource).is_err());
    }

    #[test]
    fn transaction_manager_parsing() {
        assert_eq!(
            TransactionManagerType::from_name("JDBC"),
            Some(TransactionManagerType::Jdbc)
        );
        assert_eq!(TransactionManagerType::from_name("XA"), None);
    }
}
