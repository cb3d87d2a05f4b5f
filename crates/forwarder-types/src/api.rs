//! API types for the forwarder HTTP API.
//!
//! Request and response bodies for the relayer-facing endpoints plus the
//! structured error type every handler returns.

use crate::forward::{ExecutionReceipt, ForwardRequest};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed forward request as submitted by a relayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardSubmission {
	/// The request the sender signed.
	pub request: ForwardRequest,
	/// Signature over the request's EIP-712 digest.
	pub signature: Bytes,
}

/// Response for a successfully forwarded request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardResponse {
	pub digest: B256,
	/// Whether the target accepted the payload.
	pub delivered: bool,
	#[serde(rename = "returnData")]
	pub return_data: Bytes,
}

/// Response for a read-only verification of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
	pub valid: bool,
	pub digest: B256,
	/// Rejection reason when `valid` is false.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Response carrying a sender's next expected nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
	pub address: Address,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

/// Response describing the signing domain of this forwarder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainResponse {
	pub name: String,
	pub version: String,
	#[serde(rename = "chainId")]
	pub chain_id: u64,
	#[serde(rename = "verifyingContract")]
	pub verifying_contract: Address,
	/// EIP-712 domain separator.
	pub separator: B256,
}

/// Response for a digest request, used by wallets to sign off-path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestResponse {
	pub digest: B256,
	/// `eth_signTypedData_v4` payload for the request.
	#[serde(rename = "typedData")]
	pub typed_data: serde_json::Value,
}

/// Response wrapping a stored execution receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptResponse {
	pub receipt: ExecutionReceipt,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request, e.g. unparseable signature (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Requested resource does not exist (404)
	NotFound { error_type: String, message: String },
	/// Request was well-formed but rejected by the forwarder (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}

/// Serde module for U256 values carried as decimal strings.
///
/// Deserialization also accepts `0x`-prefixed hex so wallet tooling can pass
/// nonces through unchanged.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
			Some(hex) => U256::from_str_radix(hex, 16).map_err(D::Error::custom),
			None => U256::from_str_radix(&s, 10).map_err(D::Error::custom),
		}
	}
}
