//! Forward and verify endpoints.

use super::forward_error;
use forwarder_core::{ForwardError, Forwarder};
use forwarder_types::{truncate_id, APIError, ForwardResponse, ForwardSubmission, VerifyResponse};

/// Executes a signed submission.
///
/// An inner call failure is a successful response with `delivered = false`.
pub async fn forward(
	forwarder: &Forwarder,
	submission: ForwardSubmission,
) -> Result<ForwardResponse, APIError> {
	let digest = forwarder.digest(&submission.request);

	let result = forwarder
		.execute(&submission.request, &submission.signature)
		.await
		.map_err(forward_error)?;

	if !result.delivered {
		tracing::info!(
			digest = %truncate_id(&digest.to_string()),
			return_data = %result.return_data,
			"Forwarded call failed inside target"
		);
	}

	Ok(ForwardResponse {
		digest,
		delivered: result.delivered,
		return_data: result.return_data,
	})
}

/// Checks a submission without executing it.
///
/// Rejections are reported in the body; only internal failures are errors.
pub async fn verify(
	forwarder: &Forwarder,
	submission: ForwardSubmission,
) -> Result<VerifyResponse, APIError> {
	let digest = forwarder.digest(&submission.request);

	match forwarder
		.verify(&submission.request, &submission.signature)
		.await
	{
		Ok(()) => Ok(VerifyResponse {
			valid: true,
			digest,
			error: None,
		}),
		Err(e @ (ForwardError::Storage(_) | ForwardError::Execution(_))) => Err(forward_error(e)),
		Err(e) => Ok(VerifyResponse {
			valid: false,
			digest,
			error: Some(e.to_string()),
		}),
	}
}
