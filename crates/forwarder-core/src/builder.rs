//! Builder for assembling a [`Forwarder`] from configuration.
//!
//! Each pluggable component (storage, relayer account, execution targets) is
//! created through a factory looked up by the implementation name used in the
//! configuration file.

use crate::{event_bus::EventBus, Forwarder};
use forwarder_account::{AccountError, AccountFactory, AccountInterface, AccountService};
use forwarder_config::{Config, TargetsConfig};
use forwarder_storage::{StorageError, StorageFactory, StorageInterface, StorageService};
use forwarder_target::{ExecutionTarget, TargetError, TargetFactory, TargetService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the forwarder event channel.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during forwarder construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every component type, keyed by implementation name.
pub struct ForwarderFactories<SF, AF, TF> {
	pub storage_factories: HashMap<String, SF>,
	pub account_factories: HashMap<String, AF>,
	pub target_factories: HashMap<String, TF>,
}

impl ForwarderFactories<StorageFactory, AccountFactory, TargetFactory> {
	/// Factories for every implementation shipped with the workspace.
	pub fn all() -> Self {
		fn collect<F>(pairs: Vec<(&'static str, F)>) -> HashMap<String, F> {
			pairs
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect()
		}

		Self {
			storage_factories: collect(forwarder_storage::get_all_implementations()),
			account_factories: collect(forwarder_account::get_all_implementations()),
			target_factories: collect(forwarder_target::get_all_implementations()),
		}
	}
}

/// Builder for constructing a Forwarder with pluggable implementations.
pub struct ForwarderBuilder {
	config: Config,
}

impl ForwarderBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the Forwarder using factories for each component type.
	pub async fn build<SF, AF, TF>(
		self,
		factories: ForwarderFactories<SF, AF, TF>,
	) -> Result<Forwarder, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
		TF: Fn(&toml::Value) -> Result<Box<dyn ExecutionTarget>, TargetError>,
	{
		let storage = Arc::new(StorageService::new(self.build_storage(&factories)?));
		let account = self.build_account(&factories)?;

		let relayer = account.get_address().await.map_err(|e| {
			tracing::error!(component = "account", error = %e, "Failed to get relayer address");
			BuilderError::Config(format!("Failed to get relayer address: {}", e))
		})?;

		let targets = Arc::new(self.build_targets(&factories)?);

		tracing::info!(
			forwarder_id = %self.config.forwarder.id,
			relayer = %relayer,
			domain = %self.config.domain.name,
			chain_id = self.config.domain.chain_id,
			"Forwarder assembled"
		);

		Ok(Forwarder::new(
			self.config.domain,
			storage,
			targets,
			relayer,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}

	/// Creates the primary storage backend.
	///
	/// Only the primary is instantiated: a file backend locks its directory on
	/// open.
	fn build_storage<SF, AF, TF>(
		&self,
		factories: &ForwarderFactories<SF, AF, TF>,
	) -> Result<Box<dyn StorageInterface>, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		let config = self.config.storage.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary storage '{}' is not configured", primary))
		})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				Ok(implementation)
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	fn build_account<SF, AF, TF>(
		&self,
		factories: &ForwarderFactories<SF, AF, TF>,
	) -> Result<AccountService, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let primary = &self.config.account.primary;
		let config = self.config.account.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary account '{}' is not configured", primary))
		})?;
		let factory = factories.account_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("account implementation '{}'", primary))
		})?;

		let implementation = factory(config).map_err(|e| {
			tracing::error!(
				component = "account",
				implementation = %primary,
				error = %e,
				"Failed to create account implementation"
			);
			BuilderError::Config(format!(
				"Failed to create account implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "account", implementation = %primary, "Loaded");

		Ok(AccountService::new(implementation))
	}

	fn build_targets<SF, AF, TF>(
		&self,
		factories: &ForwarderFactories<SF, AF, TF>,
	) -> Result<TargetService, BuilderError>
	where
		TF: Fn(&toml::Value) -> Result<Box<dyn ExecutionTarget>, TargetError>,
	{
		let addresses = self
			.config
			.target_addresses()
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		let mut targets = TargetService::new();
		for (name, config) in &self.config.targets.implementations {
			let implementation_name = TargetsConfig::implementation_of(name, config);
			let factory = factories
				.target_factories
				.get(implementation_name)
				.ok_or_else(|| {
					BuilderError::MissingComponent(format!(
						"target implementation '{}'",
						implementation_name
					))
				})?;
			let address = addresses.get(name).copied().ok_or_else(|| {
				BuilderError::Config(format!("Target '{}' has no address", name))
			})?;

			let implementation = factory(config).map_err(|e| {
				tracing::error!(
					component = "target",
					implementation = %name,
					error = %e,
					"Failed to create target implementation"
				);
				BuilderError::Config(format!(
					"Failed to create target implementation '{}': {}",
					name, e
				))
			})?;
			targets
				.register(address, implementation)
				.map_err(|e| BuilderError::Config(e.to_string()))?;

			tracing::info!(
				component = "target",
				name = %name,
				implementation = %implementation_name,
				address = %address,
				"Loaded"
			);
		}

		if self.config.targets.implementations.is_empty() {
			tracing::warn!("No execution targets configured; every forwarded call will fail");
		}

		Ok(targets)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address, U256};
	use forwarder_config::ConfigBuilder;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_build_with_all_factories() {
		let token = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
		let config = ConfigBuilder::new()
			.token_target("token", token, Address::repeat_byte(1))
			.build();

		let forwarder = ForwarderBuilder::new(config)
			.build(ForwarderFactories::all())
			.await
			.unwrap();

		assert_eq!(
			forwarder.relayer(),
			address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
		assert!(forwarder.targets().contains(&token));
		assert_eq!(forwarder.domain().chain_id, 31337);
	}

	#[tokio::test]
	async fn test_several_ledgers_from_one_implementation() {
		let usd = Address::repeat_byte(0x51);
		let eur = Address::repeat_byte(0x52);
		let config = ConfigBuilder::new()
			.token_target("usd", usd, Address::repeat_byte(1))
			.token_target("eur", eur, Address::repeat_byte(1))
			.build();

		let forwarder = ForwarderBuilder::new(config)
			.build(ForwarderFactories::all())
			.await
			.unwrap();

		assert!(forwarder.targets().contains(&usd));
		assert!(forwarder.targets().contains(&eur));
		// Each entry gets its own ledger state
		let usd_state = forwarder.targets().resolve(&usd).unwrap();
		let eur_state = forwarder.targets().resolve(&eur).unwrap();
		assert_ne!(
			Arc::as_ptr(&usd_state) as *const (),
			Arc::as_ptr(&eur_state) as *const ()
		);
	}

	#[tokio::test]
	async fn test_unknown_target_implementation_fails() {
		let mut config = ConfigBuilder::new().build();
		let mut table = toml::map::Map::new();
		table.insert(
			"address".to_string(),
			toml::Value::String(Address::repeat_byte(3).to_string()),
		);
		config
			.targets
			.implementations
			.insert("vault".to_string(), toml::Value::Table(table));

		let result = ForwarderBuilder::new(config)
			.build(ForwarderFactories::all())
			.await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[tokio::test]
	async fn test_nonces_persist_in_file_storage() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().to_string_lossy().to_string();
		let alice = Address::repeat_byte(0xa1);

		{
			let forwarder = ForwarderBuilder::new(ConfigBuilder::new().file_storage(&path).build())
				.build(ForwarderFactories::all())
				.await
				.unwrap();
			forwarder
				.storage()
				.store(forwarder_types::StorageKey::Nonces, &alice.to_string(), &U256::from(4u64))
				.await
				.unwrap();
		}

		let reopened = ForwarderBuilder::new(ConfigBuilder::new().file_storage(&path).build())
			.build(ForwarderFactories::all())
			.await
			.unwrap();
		assert_eq!(reopened.nonce(&alice).await.unwrap(), U256::from(4u64));
	}

	#[tokio::test]
	async fn test_nonce_ttl_is_refused() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().to_string_lossy().to_string();
		let mut config = ConfigBuilder::new().file_storage(&path).build();
		if let Some(toml::Value::Table(file)) = config.storage.implementations.get_mut("file") {
			file.insert("ttl_nonces".to_string(), toml::Value::Integer(1));
		}

		let result = ForwarderBuilder::new(config)
			.build(ForwarderFactories::all())
			.await;
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
