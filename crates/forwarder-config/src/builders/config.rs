//! Configuration builder for tests and local development.
//!
//! Produces a [`Config`] backed by in-memory storage and a local relayer key
//! without going through TOML files.

use crate::{AccountConfig, ApiConfig, Config, ForwarderConfig, StorageConfig, TargetsConfig};
use alloy_primitives::{address, Address};
use forwarder_types::ForwarderDomain;
use std::collections::HashMap;

/// First well-known development key; never use outside tests.
pub const TEST_RELAYER_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	forwarder_id: String,
	domain: ForwarderDomain,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	relayer_key: String,
	targets: HashMap<String, toml::Value>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			forwarder_id: "test-forwarder".to_string(),
			domain: ForwarderDomain {
				name: "MinimalForwarder".to_string(),
				version: "0.0.1".to_string(),
				chain_id: 31337,
				verifying_contract: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
			},
			storage_primary: "memory".to_string(),
			storage_implementations,
			relayer_key: TEST_RELAYER_KEY.to_string(),
			targets: HashMap::new(),
			api: None,
		}
	}

	pub fn forwarder_id(mut self, id: impl Into<String>) -> Self {
		self.forwarder_id = id.into();
		self
	}

	pub fn domain(mut self, domain: ForwarderDomain) -> Self {
		self.domain = domain;
		self
	}

	pub fn relayer_key(mut self, key: impl Into<String>) -> Self {
		self.relayer_key = key.into();
		self
	}

	/// Uses file storage rooted at `path` as the primary backend.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("storage_path".to_string(), toml::Value::String(path.into()));
		self.storage_implementations
			.insert("file".to_string(), toml::Value::Table(table));
		self.storage_primary = "file".to_string();
		self
	}

	/// Registers a token ledger target at `address` owned by `owner`.
	pub fn token_target(mut self, name: impl Into<String>, address: Address, owner: Address) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("implementation".to_string(), toml::Value::String("token".to_string()));
		table.insert("address".to_string(), toml::Value::String(address.to_string()));
		table.insert("owner".to_string(), toml::Value::String(owner.to_string()));
		self.targets.insert(name.into(), toml::Value::Table(table));
		self
	}

	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = Some(api);
		self
	}

	pub fn build(self) -> Config {
		let mut local = toml::map::Map::new();
		local.insert(
			"private_key".to_string(),
			toml::Value::String(self.relayer_key),
		);
		let mut account_implementations = HashMap::new();
		account_implementations.insert("local".to_string(), toml::Value::Table(local));

		Config {
			forwarder: ForwarderConfig {
				id: self.forwarder_id,
			},
			domain: self.domain,
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: 60,
			},
			account: AccountConfig {
				primary: "local".to_string(),
				implementations: account_implementations,
			},
			targets: TargetsConfig {
				implementations: self.targets,
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_produces_valid_config() {
		let token = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
		let owner = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
		let config = ConfigBuilder::new()
			.forwarder_id("builder-test")
			.token_target("token", token, owner)
			.build();

		config.validate().unwrap();
		assert_eq!(config.target_addresses().unwrap()["token"], token);
		assert_eq!(config.storage.primary, "memory");
	}

	#[test]
	fn test_file_storage_becomes_primary() {
		let config = ConfigBuilder::new().file_storage("/tmp/forwarder").build();
		assert_eq!(config.storage.primary, "file");
		assert!(config.storage.implementations.contains_key("memory"));
	}
}
