//! Per-sender nonce ledger.
//!
//! One counter per identity, starting at 0. A request is executable only
//! with the counter's current value; accepting it bumps the counter by one.

use alloy_primitives::{Address, U256};
use forwarder_storage::{StorageError, StorageService};
use forwarder_types::StorageKey;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct NonceLedger {
	storage: Arc<StorageService>,
	/// Serializes read-modify-write of counters.
	write_lock: Mutex<()>,
}

impl NonceLedger {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			write_lock: Mutex::new(()),
		}
	}

	/// Next nonce `identity` must present; 0 if never seen.
	pub async fn next_expected(&self, identity: &Address) -> Result<U256, StorageError> {
		Ok(self
			.storage
			.retrieve_optional::<U256>(StorageKey::Nonces, &identity.to_string())
			.await?
			.unwrap_or(U256::ZERO))
	}

	/// Consumes `presented` if it is the next expected nonce.
	///
	/// Returns `false` and changes nothing otherwise.
	pub async fn try_advance(
		&self,
		identity: &Address,
		presented: U256,
	) -> Result<bool, StorageError> {
		let _guard = self.write_lock.lock().await;

		let expected = self.next_expected(identity).await?;
		if presented != expected {
			return Ok(false);
		}
		let Some(next) = expected.checked_add(U256::from(1u64)) else {
			return Ok(false);
		};

		self.storage
			.store(StorageKey::Nonces, &identity.to_string(), &next)
			.await?;
		Ok(true)
	}
}
