//! # Configuration
//!
//! Factory construction parameters and service limits, loadable from JSON or
//! environment variables.

use crate::adapters::DEFAULT_CHANNEL_CAPACITY;
use crate::domain::invariants::limits;
use crate::domain::value_objects::Address;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

// =============================================================================
// FACTORY CONFIG
// =============================================================================

/// Immutable inputs of a factory: fixed at construction, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Accounts allowed to deploy. May be empty.
    pub admins: Vec<Address>,
    /// Implementation every instance starts from.
    pub base_implementation: Address,
}

impl FactoryConfig {
    /// Config with a base implementation and no admins.
    #[must_use]
    pub fn new(base_implementation: Address) -> Self {
        Self {
            admins: Vec::new(),
            base_implementation,
        }
    }

    /// Replace the admin list.
    #[must_use]
    pub fn with_admins(mut self, admins: impl IntoIterator<Item = Address>) -> Self {
        self.admins = admins.into_iter().collect();
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FACTORY_BASE_IMPLEMENTATION`: hex address (required)
    /// - `FACTORY_ADMINS`: comma-separated hex addresses (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = lookup("FACTORY_BASE_IMPLEMENTATION")
            .ok_or_else(|| ConfigError::Missing("FACTORY_BASE_IMPLEMENTATION".to_string()))?;
        let base_implementation = parse_address("FACTORY_BASE_IMPLEMENTATION", &base)?;

        let admins = match lookup("FACTORY_ADMINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_address("FACTORY_ADMINS", s))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let config = Self {
            admins,
            base_implementation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config can back a factory.
    ///
    /// An empty admin list is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_implementation.is_zero() {
            return Err(ConfigError::ZeroBaseImplementation);
        }
        if self.admins.iter().any(Address::is_zero) {
            return Err(ConfigError::ZeroAdmin);
        }
        Ok(())
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|source| ConfigError::InvalidValue {
        key: key.to_string(),
        source,
    })
}

// =============================================================================
// SERVICE CONFIG
// =============================================================================

/// Runtime limits of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum delegation depth of a call.
    pub max_call_depth: u16,
    /// Entries buffered per event subscriber.
    pub event_channel_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_call_depth: limits::MAX_CALL_DEPTH,
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FACTORY_MAX_CALL_DEPTH` (default: 1024)
    /// - `FACTORY_EVENT_CHANNEL_CAPACITY` (default: 1024)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_call_depth: match lookup("FACTORY_MAX_CALL_DEPTH") {
                Some(v) => v.parse().map_err(|_| {
                    ConfigError::InvalidParameter(format!("FACTORY_MAX_CALL_DEPTH={v}"))
                })?,
                None => defaults.max_call_depth,
            },
            event_channel_capacity: match lookup("FACTORY_EVENT_CHANNEL_CAPACITY") {
                Some(v) => v.parse().map_err(|_| {
                    ConfigError::InvalidParameter(format!("FACTORY_EVENT_CHANNEL_CAPACITY={v}"))
                })?,
                None => defaults.event_channel_capacity,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the delegation depth limit.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: u16) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the subscriber buffer size.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Check limits are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // clone -> base and proxy -> implementation each need one level
        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidParameter(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidParameter(
                "event_channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| (*v).to_string())
    }

    const BASE: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    #[test]
    fn test_factory_config_from_vars() {
        let config = FactoryConfig::from_vars(lookup(&[
            ("FACTORY_BASE_IMPLEMENTATION", BASE),
            (
                "FACTORY_ADMINS",
                "0x1111111111111111111111111111111111111111, 0x2222222222222222222222222222222222222222",
            ),
        ]))
        .unwrap();

        assert_eq!(config.base_implementation, BASE.parse().unwrap());
        assert_eq!(config.admins.len(), 2);
        assert_eq!(config.admins[1], Address::new([0x22; 20]));
    }

    #[test]
    fn test_factory_config_errors() {
        assert!(matches!(
            FactoryConfig::from_vars(lookup(&[])),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            FactoryConfig::from_vars(lookup(&[("FACTORY_BASE_IMPLEMENTATION", "0x1234")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            FactoryConfig::from_vars(lookup(&[(
                "FACTORY_BASE_IMPLEMENTATION",
                "0x0000000000000000000000000000000000000000"
            )])),
            Err(ConfigError::ZeroBaseImplementation)
        ));
    }

    #[test]
    fn test_empty_admin_list_is_valid() {
        let config = FactoryConfig::new(Address::new([1u8; 20]));
        assert!(config.validate().is_ok());

        let config = config.with_admins([Address::ZERO]);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroAdmin)));
    }

    #[test]
    fn test_factory_config_json() {
        let json = format!(
            r#"{{"admins":["0x1111111111111111111111111111111111111111"],"base_implementation":"{BASE}"}}"#
        );
        let config = FactoryConfig::from_json(&json).unwrap();
        assert_eq!(config.admins, vec![Address::new([0x11; 20])]);

        assert!(matches!(
            FactoryConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_service_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_call_depth, 1024);
        assert!(config.validate().is_ok());

        let config = ServiceConfig::from_vars(lookup(&[("FACTORY_MAX_CALL_DEPTH", "8")])).unwrap();
        assert_eq!(config.max_call_depth, 8);

        assert!(ServiceConfig::from_vars(lookup(&[("FACTORY_MAX_CALL_DEPTH", "many")])).is_err());
        assert!(ServiceConfig::default()
            .with_event_channel_capacity(0)
            .validate()
            .is_err());
    }
}
