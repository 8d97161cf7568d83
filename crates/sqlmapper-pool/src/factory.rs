//! Property-driven data source construction for the environments section.

use std::sync::Arc;
use std::time::Duration;

use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::DataSource;
use sqlmapper_core::parsing::Properties;

use crate::pooled::{PoolConfig, PooledDataSource};
use crate::unpooled::{DriverRegistry, UnpooledDataSource};

/// Builds a data source from `<dataSource>` properties.
pub trait DataSourceFactory {
    fn build(
        &self,
        properties: &Properties,
        registry: Arc<DriverRegistry>,
    ) -> Result<Arc<dyn DataSource>>;
}

/// Factory for `type="UNPOOLED"`.
pub struct UnpooledDataSourceFactory;

/// Factory for `type="POOLED"`.
pub struct PooledDataSourceFactory;

impl DataSourceFactory for UnpooledDataSourceFactory {
    fn build(
        &self,
        properties: &Properties,
        registry: Arc<DriverRegistry>,
    ) -> Result<Arc<dyn DataSource>> {
        Ok(Arc::new(build_unpooled(properties, registry, false)?))
    }
}

impl DataSourceFactory for PooledDataSourceFactory {
    fn build(
        &self,
        properties: &Properties,
        registry: Arc<DriverRegistry>,
    ) -> Result<Arc<dyn DataSource>> {
        let unpooled = build_unpooled(properties, registry, true)?;
        let config = build_pool_config(properties)?;
        Ok(Arc::new(PooledDataSource::with_config(unpooled, config)))
    }
}

fn build_unpooled(
    properties: &Properties,
    registry: Arc<DriverRegistry>,
    allow_pool_keys: bool,
) -> Result<UnpooledDataSource> {
    let driver = properties
        .get("driver")
        .ok_or_else(|| Error::builder("The dataSource requires a 'driver' property"))?;
    let url = properties
        .get("url")
        .ok_or_else(|| Error::builder("The dataSource requires a 'url' property"))?;
    let mut source = UnpooledDataSource::new(registry, driver, url);
    source.set_driver_properties(properties.sub_properties("driver"));
    for (key, value) in properties.iter() {
        match key {
            "driver" | "url" => {}
            "username" => source.set_username(Some(value.to_string())),
            "password" => source.set_password(Some(value.to_string())),
            "defaultAutoCommit" => {
                source.set_default_auto_commit(Some(parse_bool(key, value)?));
            }
            "defaultTransactionIsolationLevel" => {
                source.set_default_transaction_isolation_level(Some(
                    value.parse().map_err(|_| bad_value(key, value))?,
                ));
            }
            _ if key.starts_with("driver.") => {}
            _ if allow_pool_keys && key.starts_with("pool") => {}
            unknown => {
                return Err(Error::builder(format!(
                    "Unknown dataSource property '{}'",
                    unknown
                )));
            }
        }
    }
    Ok(source)
}

fn build_pool_config(properties: &Properties) -> Result<PoolConfig> {
    let mut config = PoolConfig::default();
    for (key, value) in properties.iter() {
        match key {
            "poolMaximumActiveConnections" => {
                config.max_active = parse_usize(key, value)?;
            }
            "poolMaximumIdleConnections" => {
                config.max_idle = parse_usize(key, value)?;
            }
            "poolMaximumCheckoutTime" => {
                config.max_checkout_time = Duration::from_millis(parse_u64(key, value)?);
            }
            "poolTimeToWait" => {
                config.time_to_wait = Duration::from_millis(parse_u64(key, value)?);
            }
            "poolMaximumLocalBadConnectionTolerance" => {
                config.max_local_bad_tolerance = parse_usize(key, value)?;
            }
            "poolPingQuery" => config.ping_query = value.to_string(),
            "poolPingEnabled" => config.ping_enabled = parse_bool(key, value)?,
            "poolPingConnectionsNotUsedFor" => {
                config.ping_not_used_for = Duration::from_millis(parse_u64(key, value)?);
            }
            _ => {}
        }
    }
    Ok(config)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(bad_value(key, value)),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| bad_value(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| bad_value(key, value))
}

fn bad_value(key: &str, value: &str) -> Error {
    Error::builder(format!(
        "Invalid value '{}' for dataSource property '{}'",
        value, key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestDriver, TestDriverOptions};

    fn registry() -> Arc<DriverRegistry> {
        let mut registry = DriverRegistry::new();
        registry.register("test", TestDriver::shared(TestDriverOptions::default()));
        Arc::new(registry)
    }

    #[test]
    fn pooled_factory_reads_pool_keys() {
        let properties = Properties::new()
            .with("driver", "test")
            .with("url", "test://db")
            .with("username", "root")
            .with("password", "secret")
            .with("poolMaximumActiveConnections", "3")
            .with("poolTimeToWait", "1500")
            .with("driver.encoding", "UTF-8");
        let source = PooledDataSourceFactory
            .build(&properties, registry())
            .unwrap();
        let connection = source.connection().unwrap();
        assert!(!connection.is_closed());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let properties = Properties::new()
            .with("driver", "test")
            .with("url", "test://db")
            .with("shoeSize", "44");
        assert!(UnpooledDataSourceFactory
            .build(&properties, registry())
            .is_err());
    }

    #[test]
    fn missing_driver_or_url_is_rejected() {
        let properties = Properties::new().with("url", "test://db");
        assert!(UnpooledDataSourceFactory
            .build(&properties, registry())
            .is_err());
        let properties = Properties::new().with("driver", "test");
        assert!(UnpooledDataSourceFactory
            .build(&properties, registry())
            .is_err());
    }
}
