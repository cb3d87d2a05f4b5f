//! Execution receipt lookup endpoint.

use super::forward_error;
use alloy_primitives::B256;
use forwarder_core::Forwarder;
use forwarder_types::{APIError, ReceiptResponse};

/// Returns the stored receipt for a request digest.
pub async fn get_receipt(forwarder: &Forwarder, digest: &str) -> Result<ReceiptResponse, APIError> {
	let parsed: B256 = digest.parse().map_err(|e| APIError::BadRequest {
		error_type: "INVALID_DIGEST".to_string(),
		message: format!("Invalid digest '{}': {}", digest, e),
		details: None,
	})?;

	match forwarder.receipt(&parsed).await.map_err(forward_error)? {
		Some(receipt) => Ok(ReceiptResponse { receipt }),
		None => Err(APIError::NotFound {
			error_type: "RECEIPT_NOT_FOUND".to_string(),
			message: format!("No receipt for digest {}", parsed),
		}),
	}
}
