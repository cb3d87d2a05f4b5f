//! Local private-key account.
//!
//! Holds a secp256k1 key in process memory. Suitable for a relayer running next
//! to its key and for deterministic test wallets.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use forwarder_types::{
	without_0x_prefix, Address, Bytes, ConfigSchema, Field, FieldType, ImplementationRegistry,
	Schema, SecretString, ValidationError, B256,
};

/// Account backed by an in-memory private key.
#[derive(Debug)]
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key, with or without `0x`.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key.with_exposed(|key| {
			key.parse()
				.map_err(|_| AccountError::InvalidKey("Invalid private key format".to_string()))
		})?;

		Ok(Self { signer })
	}

	/// Address derived from the private key.
	pub fn wallet_address(&self) -> Address {
		self.signer.address()
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_digest(&self, digest: &B256) -> Result<Bytes, AccountError> {
		let signature = self
			.signer
			.sign_hash_sync(digest)
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;

		Ok(Bytes::copy_from_slice(&signature.as_bytes()))
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let hex = without_0x_prefix(key);
					if hex.len() != 64 {
						return Err("Private key must be 64 hex characters".to_string());
					}
					if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
						return Err("Private key must be hex".to_string());
					}
					Ok(())
				}),
			],
			vec![],
		);

		schema.validate(config)
	}
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex-encoded secp256k1 key (required)
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	let wallet = LocalWallet::new(&private_key)?;
	tracing::debug!(address = %wallet.wallet_address(), "Loaded local account");

	Ok(Box::new(wallet))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, keccak256, Signature};

	// Anvil account #0
	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(key: &str) -> toml::Value {
		toml::from_str(&format!("private_key = \"{}\"", key)).unwrap()
	}

	#[tokio::test]
	async fn test_address_from_key() {
		let account = create_account(&config(KEY)).unwrap();
		assert_eq!(
			account.address().await.unwrap(),
			address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
	}

	#[tokio::test]
	async fn test_signature_recovers_to_account() {
		let account = create_account(&config(KEY)).unwrap();
		let digest = keccak256(b"forward me");

		let raw = account.sign_digest(&digest).await.unwrap();
		assert_eq!(raw.len(), 65);
		assert!(raw[64] == 27 || raw[64] == 28);

		let signature = Signature::from_raw(&raw).unwrap();
		assert_eq!(
			signature.recover_address_from_prehash(&digest).unwrap(),
			account.address().await.unwrap()
		);
	}

	#[test]
	fn test_invalid_keys_rejected() {
		assert!(create_account(&config("0x1234")).is_err());
		assert!(create_account(&config(&"zz".repeat(32))).is_err());
		assert!(create_account(&toml::Value::Table(Default::default())).is_err());
	}

	#[test]
	fn test_debug_does_not_print_key() {
		let wallet = LocalWallet::new(&SecretString::from(KEY)).unwrap();
		let rendered = format!("{:?}", wallet);
		assert!(!rendered.contains(&KEY[2..]));
	}
}
