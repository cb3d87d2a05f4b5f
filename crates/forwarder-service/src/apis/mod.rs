//! Handlers for the forwarder HTTP API.
//!
//! Each module holds the logic behind one group of endpoints and returns
//! [`APIError`] on failure; routing lives in `server.rs`.

pub mod domain;
pub mod forward;
pub mod nonce;
pub mod receipt;

use forwarder_core::ForwardError;
use forwarder_types::APIError;
use serde_json::json;

/// Maps a forwarder error onto the API error shape.
///
/// Rejections the relayer can act on are client errors; storage and task
/// failures are internal.
pub fn forward_error(err: ForwardError) -> APIError {
	let message = err.to_string();
	match err {
		ForwardError::MalformedSignature(_) => APIError::BadRequest {
			error_type: "MALFORMED_SIGNATURE".to_string(),
			message,
			details: None,
		},
		ForwardError::Unauthorized { claimed, recovered } => APIError::UnprocessableEntity {
			error_type: "UNAUTHORIZED".to_string(),
			message,
			details: Some(json!({
				"claimed": claimed,
				"recovered": recovered,
			})),
		},
		ForwardError::StaleOrFutureNonce {
			expected,
			presented,
		} => APIError::UnprocessableEntity {
			error_type: "STALE_OR_FUTURE_NONCE".to_string(),
			message,
			details: Some(json!({
				"expected": expected.to_string(),
				"presented": presented.to_string(),
			})),
		},
		ForwardError::Storage(_) => APIError::InternalServerError {
			error_type: "STORAGE_ERROR".to_string(),
			message,
		},
		ForwardError::Execution(_) => APIError::InternalServerError {
			error_type: "EXECUTION_ERROR".to_string(),
			message,
		},
	}
}
