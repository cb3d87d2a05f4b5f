//! Token ledger target.
//!
//! A fungible balance ledger driven by ABI-encoded calls. `transfer` moves the
//! origin's own balance, so a forwarded transfer spends the signer's funds and
//! never the relayer's. `mint` and `transferOwnership` are gated on the ledger's
//! `owner`.
//!
//! Ledger state lives in a [`SharedTokenState`] separate from the
//! [`TokenLedger`] logic object, so the logic can be upgraded in place.

use crate::{ExecutionTarget, TargetError, TargetFactory, TargetRegistry};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolError, SolInterface, SolValue};
use async_trait::async_trait;
use forwarder_types::{
	ConfigSchema, DispatchOutcome, Field, FieldType, ImplementationRegistry, Schema,
	ValidationError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

sol! {
	/// Calls accepted by the token ledger.
	interface ITokenLedger {
		function transfer(address to, uint256 amount) external returns (bool);
		function mint(address to, uint256 amount) external;
		function balanceOf(address account) external view returns (uint256);
		function owner() external view returns (address);
		function transferOwnership(address newOwner) external;
		function totalSupply() external view returns (uint256);
	}

	error Unauthorized(address caller);
	error InsufficientBalance(address account, uint256 balance, uint256 needed);
	error UnknownSelector(bytes4 selector);
	error InvalidCalldata();
	error SupplyOverflow();
}

/// Balances, supply and owner of one ledger.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
	pub owner: Address,
	pub balances: HashMap<Address, U256>,
	pub total_supply: U256,
}

impl TokenState {
	pub fn new(owner: Address) -> Self {
		Self {
			owner,
			..Default::default()
		}
	}

	pub fn balance_of(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or_default()
	}
}

/// Ledger state shared across logic upgrades.
pub type SharedTokenState = Arc<RwLock<TokenState>>;

/// Token ledger logic.
pub struct TokenLedger {
	state: SharedTokenState,
}

impl TokenLedger {
	/// Creates a ledger with fresh state owned by `owner`.
	pub fn new(owner: Address) -> Self {
		Self::from_state(Arc::new(RwLock::new(TokenState::new(owner))))
	}

	/// Creates ledger logic over existing state.
	pub fn from_state(state: SharedTokenState) -> Self {
		Self { state }
	}

	/// Handle to the underlying state, for upgrades and inspection.
	pub fn state(&self) -> SharedTokenState {
		Arc::clone(&self.state)
	}

	async fn execute(
		&self,
		origin: Address,
		call: ITokenLedger::ITokenLedgerCalls,
	) -> DispatchOutcome {
		use ITokenLedger::ITokenLedgerCalls as Call;

		match call {
			Call::transfer(c) => {
				let mut state = self.state.write().await;
				let balance = state.balance_of(&origin);
				if balance < c.amount {
					return DispatchOutcome::failure(
						InsufficientBalance {
							account: origin,
							balance,
							needed: c.amount,
						}
						.abi_encode(),
					);
				}
				state.balances.insert(origin, balance - c.amount);
				let to_balance = state.balance_of(&c.to);
				state.balances.insert(c.to, to_balance + c.amount);

				tracing::debug!(from = %origin, to = %c.to, amount = %c.amount, "Token transfer");
				DispatchOutcome::success(true.abi_encode())
			},
			Call::mint(c) => {
				let mut state = self.state.write().await;
				if origin != state.owner {
					return DispatchOutcome::failure(Unauthorized { caller: origin }.abi_encode());
				}
				let Some(supply) = state.total_supply.checked_add(c.amount) else {
					return DispatchOutcome::failure(SupplyOverflow {}.abi_encode());
				};
				state.total_supply = supply;
				let to_balance = state.balance_of(&c.to);
				state.balances.insert(c.to, to_balance + c.amount);

				tracing::debug!(to = %c.to, amount = %c.amount, "Token mint");
				DispatchOutcome::success(Bytes::new())
			},
			Call::balanceOf(c) => {
				let state = self.state.read().await;
				DispatchOutcome::success(state.balance_of(&c.account).abi_encode())
			},
			Call::owner(_) => {
				let state = self.state.read().await;
				DispatchOutcome::success(state.owner.abi_encode())
			},
			Call::transferOwnership(c) => {
				let mut state = self.state.write().await;
				if origin != state.owner {
					return DispatchOutcome::failure(Unauthorized { caller: origin }.abi_encode());
				}
				state.owner = c.newOwner;

				tracing::info!(new_owner = %c.newOwner, "Token ownership transferred");
				DispatchOutcome::success(Bytes::new())
			},
			Call::totalSupply(_) => {
				let state = self.state.read().await;
				DispatchOutcome::success(state.total_supply.abi_encode())
			},
		}
	}
}

#[async_trait]
impl ExecutionTarget for TokenLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(TokenLedgerSchema)
	}

	async fn dispatch(&self, origin: Address, payload: &Bytes) -> DispatchOutcome {
		let Some(selector) = payload.get(..4) else {
			return DispatchOutcome::failure(InvalidCalldata {}.abi_encode());
		};
		let mut selector_bytes = [0u8; 4];
		selector_bytes.copy_from_slice(selector);

		if !ITokenLedger::ITokenLedgerCalls::valid_selector(selector_bytes) {
			return DispatchOutcome::failure(
				UnknownSelector {
					selector: selector_bytes.into(),
				}
				.abi_encode(),
			);
		}

		match ITokenLedger::ITokenLedgerCalls::abi_decode(payload) {
			Ok(call) => self.execute(origin, call).await,
			Err(e) => {
				tracing::debug!(error = %e, "Undecodable token call");
				DispatchOutcome::failure(InvalidCalldata {}.abi_encode())
			},
		}
	}
}

fn parse_u256(value: &toml::Value) -> Result<U256, String> {
	match value {
		toml::Value::Integer(i) if *i >= 0 => Ok(U256::from(*i as u64)),
		toml::Value::String(s) => s
			.parse::<U256>()
			.map_err(|e| format!("Invalid amount '{}': {}", s, e)),
		_ => Err("Expected a non-negative integer or decimal string".to_string()),
	}
}

/// Configuration schema for TokenLedger.
pub struct TokenLedgerSchema;

impl ConfigSchema for TokenLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let initial_supply = match config.get("initial_supply") {
			Some(toml::Value::Integer(_)) => Field::new(
				"initial_supply",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			),
			_ => Field::new("initial_supply", FieldType::String)
				.with_validator(|v| parse_u256(v).map(|_| ())),
		};

		let schema = Schema::new(
			vec![Field::new("address", FieldType::Address)],
			vec![Field::new("owner", FieldType::Address), initial_supply],
		);

		schema.validate(config)
	}
}

/// Factory function to create a token ledger from configuration.
///
/// Configuration parameters:
/// - `address`: identity the ledger is reachable at (required, used for routing)
/// - `owner`: owner allowed to mint (default: zero address, nobody can mint)
/// - `initial_supply`: amount credited to `owner` at startup (default: 0)
pub fn create_target(config: &toml::Value) -> Result<Box<dyn ExecutionTarget>, TargetError> {
	TokenLedgerSchema
		.validate(config)
		.map_err(|e| TargetError::Configuration(e.to_string()))?;

	let owner = config
		.get("owner")
		.and_then(|v| v.as_str())
		.map(|s| s.parse::<Address>())
		.transpose()
		.map_err(|e| TargetError::Configuration(format!("Invalid owner: {}", e)))?
		.unwrap_or(Address::ZERO);

	let initial_supply = config
		.get("initial_supply")
		.map(parse_u256)
		.transpose()
		.map_err(TargetError::Configuration)?
		.unwrap_or(U256::ZERO);

	let mut state = TokenState::new(owner);
	if !initial_supply.is_zero() {
		state.balances.insert(owner, initial_supply);
		state.total_supply = initial_supply;
	}

	Ok(Box::new(TokenLedger::from_state(Arc::new(RwLock::new(state)))))
}

/// Registry for the token ledger implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "token";
	type Factory = TargetFactory;

	fn factory() -> Self::Factory {
		create_target
	}
}

impl TargetRegistry for Registry {}
