//! Execution targets for forwarded calls.
//!
//! A target is any component that accepts an opaque payload together with the
//! identity that authorized it. The forwarder hands over the verified sender as
//! `origin`; the target decodes the payload and applies its own access rules.
//!
//! [`TargetService`] addresses targets by a stable identity and lets the logic
//! behind an identity be swapped at runtime while callers keep using the same
//! address.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use forwarder_types::{
	truncate_id, Address, Bytes, ConfigSchema, DispatchOutcome, ImplementationRegistry,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod token;
}

/// Errors that can occur while configuring or managing targets.
#[derive(Debug, Error)]
pub enum TargetError {
	/// Error that occurs when target configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs when two targets claim one identity.
	#[error("Target already registered at {0}")]
	AlreadyRegistered(Address),
	/// Error that occurs when no target is registered at an identity.
	#[error("No target registered at {0}")]
	NotFound(Address),
}

/// A component that executes forwarded payloads.
#[async_trait]
pub trait ExecutionTarget: Send + Sync {
	/// Returns the configuration schema for this target implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Executes `payload` on behalf of `origin`.
	///
	/// Failures are reported in the outcome, never as a panic or error: a
	/// rejected payload is a normal result of forwarding.
	async fn dispatch(&self, origin: Address, payload: &Bytes) -> DispatchOutcome;
}

/// Type alias for target factory functions.
pub type TargetFactory = fn(&toml::Value) -> Result<Box<dyn ExecutionTarget>, TargetError>;

/// Registry trait for target implementations.
pub trait TargetRegistry: ImplementationRegistry<Factory = TargetFactory> {}

/// Get all registered target implementations.
pub fn get_all_implementations() -> Vec<(&'static str, TargetFactory)> {
	use implementations::token;

	vec![(token::Registry::NAME, token::Registry::factory())]
}

/// Shared handle to the logic currently installed at an identity.
pub type TargetHandle = Arc<dyn ExecutionTarget>;

/// Routes payloads to targets by identity.
///
/// The set of identities is fixed once the service is built. The logic behind
/// each identity can be replaced with [`TargetService::upgrade`]; state owned
/// outside the implementation object survives the swap.
#[derive(Default)]
pub struct TargetService {
	targets: HashMap<Address, ArcSwap<TargetHandle>>,
}

impl TargetService {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a target at a new identity.
	pub fn register(
		&mut self,
		address: Address,
		target: Box<dyn ExecutionTarget>,
	) -> Result<(), TargetError> {
		if self.targets.contains_key(&address) {
			return Err(TargetError::AlreadyRegistered(address));
		}
		self.targets
			.insert(address, ArcSwap::from_pointee(Arc::from(target)));
		Ok(())
	}

	/// Returns the logic currently installed at `address`.
	///
	/// The handle is a snapshot: an upgrade after this call does not affect a
	/// dispatch already holding it.
	pub fn resolve(&self, address: &Address) -> Option<TargetHandle> {
		self.targets
			.get(address)
			.map(|slot| TargetHandle::clone(&slot.load()))
	}

	/// Replaces the logic behind an existing identity.
	pub fn upgrade(
		&self,
		address: Address,
		implementation: Box<dyn ExecutionTarget>,
	) -> Result<(), TargetError> {
		let slot = self
			.targets
			.get(&address)
			.ok_or(TargetError::NotFound(address))?;
		slot.store(Arc::new(Arc::from(implementation)));

		tracing::info!(target_address = %truncate_id(&address.to_string()), "Target upgraded");
		Ok(())
	}

	/// Dispatches a payload to the target at `address`.
	///
	/// An unknown identity is an inner failure with empty return data.
	pub async fn dispatch(
		&self,
		address: &Address,
		origin: Address,
		payload: &Bytes,
	) -> DispatchOutcome {
		match self.resolve(address) {
			Some(target) => target.dispatch(origin, payload).await,
			None => {
				tracing::warn!(target_address = %address, "No target registered");
				DispatchOutcome::failure(Bytes::new())
			},
		}
	}

	/// Identities with a registered target.
	pub fn addresses(&self) -> impl Iterator<Item = &Address> {
		self.targets.keys()
	}

	pub fn contains(&self, address: &Address) -> bool {
		self.targets.contains_key(address)
	}
}
