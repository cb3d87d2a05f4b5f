//! Nonce lookup endpoint.

use super::forward_error;
use alloy_primitives::Address;
use forwarder_core::Forwarder;
use forwarder_types::{APIError, NonceResponse};

/// Returns the next nonce `address` must sign.
pub async fn get_nonce(forwarder: &Forwarder, address: &str) -> Result<NonceResponse, APIError> {
	let address: Address = address.parse().map_err(|e| APIError::BadRequest {
		error_type: "INVALID_ADDRESS".to_string(),
		message: format!("Invalid address '{}': {}", address, e),
		details: None,
	})?;

	let nonce = forwarder.nonce(&address).await.map_err(forward_error)?;
	Ok(NonceResponse { address, nonce })
}
