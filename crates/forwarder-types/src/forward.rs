//! Forward request types.
//!
//! A [`ForwardRequest`] is the authorization a sender signs off-path. It is
//! bound to a single forwarder deployment through a [`ForwarderDomain`] and,
//! once executed, produces an [`ExecutionResult`] describing what the target
//! did with the payload.

use crate::api::u256_serde;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A sender's signed intent to call `to` with `data`.
///
/// The request is only executable while `nonce` equals the sender's next
/// expected nonce on the forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardRequest {
	/// Identity that authorized the call and is reported as its origin.
	pub from: Address,
	/// Identity of the execution target.
	pub to: Address,
	/// Sequence number that must match the sender's next expected nonce.
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	/// Opaque call payload interpreted by the target.
	pub data: Bytes,
}

impl ForwardRequest {
	pub fn new(from: Address, to: Address, nonce: U256, data: impl Into<Bytes>) -> Self {
		Self {
			from,
			to,
			nonce,
			data: data.into(),
		}
	}
}

/// EIP-712 domain binding signatures to one forwarder deployment.
///
/// Changing any field invalidates every signature issued under the old domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderDomain {
	/// Human readable signing domain name.
	pub name: String,
	/// Version tag of the signing domain.
	pub version: String,
	/// Chain or network discriminator.
	pub chain_id: u64,
	/// Identity of the forwarder instance itself.
	pub verifying_contract: Address,
}

/// Outcome reported by an execution target for a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
	pub success: bool,
	pub return_data: Bytes,
}

impl DispatchOutcome {
	pub fn success(return_data: impl Into<Bytes>) -> Self {
		Self {
			success: true,
			return_data: return_data.into(),
		}
	}

	pub fn failure(return_data: impl Into<Bytes>) -> Self {
		Self {
			success: false,
			return_data: return_data.into(),
		}
	}
}

/// Result of a forwarding call that passed signature and nonce checks.
///
/// `delivered` reflects the inner call only. The sender's nonce has been
/// consumed either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
	pub delivered: bool,
	#[serde(rename = "returnData")]
	pub return_data: Bytes,
}

impl ExecutionResult {
	/// Converts an inner failure into an error carrying the target's revert data.
	pub fn into_result(self) -> Result<Bytes, InnerCallFailed> {
		if self.delivered {
			Ok(self.return_data)
		} else {
			Err(InnerCallFailed {
				return_data: self.return_data,
			})
		}
	}
}

impl From<DispatchOutcome> for ExecutionResult {
	fn from(outcome: DispatchOutcome) -> Self {
		Self {
			delivered: outcome.success,
			return_data: outcome.return_data,
		}
	}
}

/// The target rejected a forwarded payload.
///
/// This is not a forwarder fault: the request was authenticated and its nonce
/// consumed before the target ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Inner call failed with return data {return_data}")]
pub struct InnerCallFailed {
	pub return_data: Bytes,
}

/// Persisted record of an executed forward request, keyed by digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
	pub digest: B256,
	pub from: Address,
	pub to: Address,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	pub delivered: bool,
	#[serde(rename = "returnData")]
	pub return_data: Bytes,
	/// Identity that submitted the request and paid for its execution.
	pub relayer: Address,
	/// Unix timestamp (seconds) of execution.
	#[serde(rename = "executedAt")]
	pub executed_at: u64,
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_forward_request_json_uses_decimal_nonce() {
		let request = ForwardRequest::new(
			address!("0x1111111111111111111111111111111111111111"),
			address!("0x2222222222222222222222222222222222222222"),
			U256::from(42u64),
			vec![0xde, 0xad],
		);

		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(json["nonce"], "42");
		assert_eq!(json["data"], "0xdead");

		let parsed: ForwardRequest = serde_json::from_value(json).unwrap();
		assert_eq!(parsed, request);
	}

	#[test]
	fn test_inner_failure_into_result() {
		let failed = ExecutionResult::from(DispatchOutcome::failure(vec![1u8, 2, 3]));
		assert!(!failed.delivered);

		let err = failed.into_result().unwrap_err();
		assert_eq!(err.return_data, Bytes::from(vec![1u8, 2, 3]));
		assert_eq!(err.to_string(), "Inner call failed with return data 0x010203");
		let _: &dyn std::error::Error = &err;

		let delivered = ExecutionResult::from(DispatchOutcome::success(vec![9u8]));
		assert_eq!(delivered.into_result().unwrap(), Bytes::from(vec![9u8]));
	}
}
