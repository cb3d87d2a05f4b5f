//! HTTP server for the forwarder API.
//!
//! Relayers submit signed requests here; wallets and dashboards read nonces,
//! the signing domain and execution receipts.

use axum::{
	extract::{DefaultBodyLimit, Path, State},
	response::Json,
	routing::{get, post},
	Router,
};
use forwarder_config::ApiConfig;
use forwarder_core::Forwarder;
use forwarder_types::{
	APIError, DigestResponse, DomainResponse, ForwardRequest, ForwardResponse, ForwardSubmission,
	NonceResponse, ReceiptResponse, VerifyResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub forwarder: Arc<Forwarder>,
}

/// Builds the API router with its middleware stack.
pub fn router(api_config: &ApiConfig, forwarder: Arc<Forwarder>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/forward", post(handle_forward))
				.route("/verify", post(handle_verify))
				.route("/nonces/{address}", get(handle_get_nonce))
				.route("/domain", get(handle_get_domain))
				.route("/digest", post(handle_digest))
				.route("/receipts/{digest}", get(handle_get_receipt)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { forwarder })
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	forwarder: Arc<Forwarder>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, forwarder);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Forwarder API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/forward requests.
async fn handle_forward(
	State(state): State<AppState>,
	Json(submission): Json<ForwardSubmission>,
) -> Result<Json<ForwardResponse>, APIError> {
	match crate::apis::forward::forward(&state.forwarder, submission).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Forward request failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/verify requests.
async fn handle_verify(
	State(state): State<AppState>,
	Json(submission): Json<ForwardSubmission>,
) -> Result<Json<VerifyResponse>, APIError> {
	crate::apis::forward::verify(&state.forwarder, submission)
		.await
		.map(Json)
}

/// Handles GET /api/nonces/{address} requests.
async fn handle_get_nonce(
	Path(address): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<NonceResponse>, APIError> {
	crate::apis::nonce::get_nonce(&state.forwarder, &address)
		.await
		.map(Json)
}

/// Handles GET /api/domain requests.
async fn handle_get_domain(State(state): State<AppState>) -> Json<DomainResponse> {
	Json(crate::apis::domain::get_domain(&state.forwarder))
}

/// Handles POST /api/digest requests.
async fn handle_digest(
	State(state): State<AppState>,
	Json(request): Json<ForwardRequest>,
) -> Json<DigestResponse> {
	Json(crate::apis::domain::get_digest(&state.forwarder, &request))
}

/// Handles GET /api/receipts/{digest} requests.
async fn handle_get_receipt(
	Path(digest): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<ReceiptResponse>, APIError> {
	crate::apis::receipt::get_receipt(&state.forwarder, &digest)
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes, B256, U256};
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use axum::{
		body::{to_bytes, Body},
		http::{Request, StatusCode},
	};
	use forwarder_config::ConfigBuilder;
	use forwarder_core::{ForwarderBuilder, ForwarderFactories};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	const TOKEN: Address = Address::repeat_byte(0x70);

	fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".to_string(),
			port: 3000,
			timeout_seconds: 30,
			max_request_size: 1024 * 1024,
		}
	}

	async fn app() -> (Router, Arc<Forwarder>) {
		let config = ConfigBuilder::new()
			.token_target("token", TOKEN, Address::repeat_byte(1))
			.build();
		let forwarder = Arc::new(
			ForwarderBuilder::new(config)
				.build(ForwarderFactories::all())
				.await
				.unwrap(),
		);
		(router(&api_config(), Arc::clone(&forwarder)), forwarder)
	}

	async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		(status, serde_json::from_slice(&body).unwrap_or(Value::Null))
	}

	fn post_json(uri: &str, body: Value) -> Request<Body> {
		Request::post(uri)
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	fn get(uri: &str) -> Request<Body> {
		Request::get(uri).body(Body::empty()).unwrap()
	}

	fn signed_submission(forwarder: &Forwarder, signer: &PrivateKeySigner, nonce: u64) -> Value {
		let request = ForwardRequest::new(signer.address(), TOKEN, U256::from(nonce), Bytes::new());
		let signature = signer.sign_hash_sync(&forwarder.digest(&request)).unwrap();
		json!({
			"request": request,
			"signature": Bytes::copy_from_slice(&signature.as_bytes()),
		})
	}

	#[tokio::test]
	async fn test_forward_then_replay() {
		let (app, forwarder) = app().await;
		let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).unwrap();
		let submission = signed_submission(&forwarder, &signer, 0);

		let (status, body) = call(&app, post_json("/api/verify", submission.clone())).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["valid"], true);

		let (status, body) = call(&app, post_json("/api/forward", submission.clone())).await;
		assert_eq!(status, StatusCode::OK);
		// Empty payload is rejected by the token ledger, but the call was forwarded
		assert_eq!(body["delivered"], false);

		let (status, body) = call(&app, post_json("/api/forward", submission)).await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "STALE_OR_FUTURE_NONCE");

		let (status, body) = call(&app, get(&format!("/api/nonces/{}", signer.address()))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["nonce"], "1");
	}

	#[tokio::test]
	async fn test_malformed_signature_is_bad_request() {
		let (app, forwarder) = app().await;
		let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).unwrap();
		let mut submission = signed_submission(&forwarder, &signer, 0);
		submission["signature"] = json!("0x1234");

		let (status, body) = call(&app, post_json("/api/forward", submission)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "MALFORMED_SIGNATURE");
	}

	#[tokio::test]
	async fn test_receipt_lookup() {
		let (app, forwarder) = app().await;
		let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).unwrap();

		let (status, forwarded) = call(
			&app,
			post_json("/api/forward", signed_submission(&forwarder, &signer, 0)),
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let digest = forwarded["digest"].as_str().unwrap().to_string();
		let (status, body) = call(&app, get(&format!("/api/receipts/{}", digest))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["receipt"]["nonce"], "0");

		let (status, body) = call(&app, get(&format!("/api/receipts/{}", B256::ZERO))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "RECEIPT_NOT_FOUND");

		let (status, _) = call(&app, get("/api/receipts/not-a-digest")).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_domain_and_digest() {
		let (app, forwarder) = app().await;

		let (status, body) = call(&app, get("/api/domain")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["name"], "MinimalForwarder");
		assert_eq!(body["chainId"], 31337);
		assert_eq!(
			body["separator"],
			forwarder.domain_separator().to_string()
		);

		let request = ForwardRequest::new(Address::repeat_byte(5), TOKEN, U256::ZERO, Bytes::new());
		let (status, body) = call(&app, post_json("/api/digest", json!(request))).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["digest"], forwarder.digest(&request).to_string());
		assert_eq!(body["typedData"]["primaryType"], "ForwardRequest");
	}

	#[tokio::test]
	async fn test_invalid_address_is_bad_request() {
		let (app, _) = app().await;
		let (status, body) = call(&app, get("/api/nonces/0x1234")).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_ADDRESS");
	}
}
