//! Event types published by the forwarder.
//!
//! Every forwarding attempt that reaches a verdict emits exactly one event on
//! the in-process event bus so monitoring and API layers can observe outcomes
//! without polling storage.

use crate::api::u256_serde;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Main event type for forwarding outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwarderEvent {
	/// A request passed verification, consumed its nonce and was dispatched.
	Executed {
		digest: B256,
		from: Address,
		to: Address,
		#[serde(with = "u256_serde")]
		nonce: U256,
		delivered: bool,
	},
	/// A request was rejected before any state change.
	Rejected {
		digest: B256,
		from: Address,
		reason: RejectionReason,
	},
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
	MalformedSignature,
	Unauthorized,
	StaleOrFutureNonce,
}
