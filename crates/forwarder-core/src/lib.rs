//! Core forwarding engine.
//!
//! A [`Forwarder`] accepts a signed [`ForwardRequest`] from any relayer,
//! checks that the claimed sender signed it under this forwarder's domain,
//! consumes the sender's next nonce, and dispatches the payload to the target
//! with the sender (not the relayer) as origin.
//!
//! Rejections (malformed signature, wrong signer, wrong nonce) leave no trace
//! in state. Once a nonce is consumed the dispatch always runs, and an inner
//! failure is reported in the [`ExecutionResult`] rather than as an error.

use alloy_primitives::{Address, B256, U256};
use dashmap::DashMap;
use forwarder_storage::StorageService;
use forwarder_target::TargetService;
use forwarder_types::{
	truncate_id, utils::current_timestamp, ExecutionReceipt, ExecutionResult, ForwardRequest,
	ForwarderDomain, ForwarderEvent, RejectionReason, StorageKey,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{instrument, Instrument};

pub mod builder;
pub mod codec;
pub mod event_bus;
pub mod nonce;
pub mod verifier;

pub use builder::{BuilderError, ForwarderBuilder, ForwarderFactories};
pub use codec::StructuredMessageCodec;
pub use event_bus::EventBus;
pub use nonce::NonceLedger;

/// Errors returned by the forwarder.
#[derive(Debug, Error)]
pub enum ForwardError {
	/// Signature bytes cannot be parsed or no key is recoverable.
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
	/// The signature was produced by someone other than the claimed sender.
	#[error("Signature by {recovered} does not match claimed sender {claimed}")]
	Unauthorized { claimed: Address, recovered: Address },
	/// The presented nonce is not the sender's next expected nonce.
	#[error("Nonce mismatch: expected {expected}, presented {presented}")]
	StaleOrFutureNonce { expected: U256, presented: U256 },
	/// Nonce or receipt persistence failed.
	#[error("Storage error: {0}")]
	Storage(String),
	/// The execution task ended without producing a result.
	#[error("Execution task failed: {0}")]
	Execution(String),
}

impl ForwardError {
	/// Reason code for rejections; `None` for internal failures.
	pub fn rejection_reason(&self) -> Option<RejectionReason> {
		match self {
			ForwardError::MalformedSignature(_) => Some(RejectionReason::MalformedSignature),
			ForwardError::Unauthorized { .. } => Some(RejectionReason::Unauthorized),
			ForwardError::StaleOrFutureNonce { .. } => Some(RejectionReason::StaleOrFutureNonce),
			ForwardError::Storage(_) | ForwardError::Execution(_) => None,
		}
	}
}

impl From<verifier::VerifyError> for ForwardError {
	fn from(err: verifier::VerifyError) -> Self {
		match err {
			verifier::VerifyError::MalformedSignature(msg) => ForwardError::MalformedSignature(msg),
		}
	}
}

impl From<forwarder_storage::StorageError> for ForwardError {
	fn from(err: forwarder_storage::StorageError) -> Self {
		ForwardError::Storage(err.to_string())
	}
}

type SenderLocks = DashMap<Address, Arc<Mutex<()>>>;

/// Signature-authenticated call forwarder.
pub struct Forwarder {
	codec: StructuredMessageCodec,
	nonces: Arc<NonceLedger>,
	storage: Arc<StorageService>,
	targets: Arc<TargetService>,
	/// Identity submitting requests and paying for execution.
	relayer: Address,
	event_bus: EventBus,
	/// Serializes advance and dispatch per authenticated sender. Entries exist
	/// only while a request for that sender is in flight.
	sender_locks: Arc<SenderLocks>,
}

impl Forwarder {
	pub fn new(
		domain: ForwarderDomain,
		storage: Arc<StorageService>,
		targets: Arc<TargetService>,
		relayer: Address,
		event_bus: EventBus,
	) -> Self {
		Self {
			codec: StructuredMessageCodec::new(domain),
			nonces: Arc::new(NonceLedger::new(Arc::clone(&storage))),
			storage,
			targets,
			relayer,
			event_bus,
			sender_locks: Arc::new(DashMap::new()),
		}
	}

	/// Authenticates and executes a signed request.
	///
	/// On success the sender's nonce has been consumed, whatever the target
	/// did with the payload. Once the signature checks out, the rest runs on a
	/// separate task: dropping the returned future does not stop a consumed
	/// nonce from reaching its dispatch.
	#[instrument(skip_all, fields(from = %record.from, to = %record.to, nonce = %record.nonce))]
	pub async fn execute(
		&self,
		record: &ForwardRequest,
		signature: &[u8],
	) -> Result<ExecutionResult, ForwardError> {
		let digest = self.codec.encode(record);

		if let Err(e) = self.authenticate(&digest, record, signature) {
			publish_rejection(&self.event_bus, digest, record.from, &e);
			return Err(e);
		}

		let lock = self.sender_lock(record.from);
		let execution = Execution {
			nonces: Arc::clone(&self.nonces),
			storage: Arc::clone(&self.storage),
			targets: Arc::clone(&self.targets),
			event_bus: self.event_bus.clone(),
			relayer: self.relayer,
			sender_locks: Arc::clone(&self.sender_locks),
		};

		tokio::spawn(
			execution
				.run(digest, record.clone(), lock)
				.in_current_span(),
		)
		.await
		.map_err(|e| {
			tracing::error!(error = %e, "Execution task failed");
			ForwardError::Execution(e.to_string())
		})?
	}

	/// Runs every check `execute` would, without consuming the nonce.
	pub async fn verify(
		&self,
		record: &ForwardRequest,
		signature: &[u8],
	) -> Result<(), ForwardError> {
		let digest = self.codec.encode(record);
		self.authenticate(&digest, record, signature)?;

		let expected = self.nonces.next_expected(&record.from).await?;
		if expected != record.nonce {
			return Err(ForwardError::StaleOrFutureNonce {
				expected,
				presented: record.nonce,
			});
		}
		Ok(())
	}

	/// Digest a sender signs to authorize `record` on this forwarder.
	pub fn digest(&self, record: &ForwardRequest) -> B256 {
		self.codec.encode(record)
	}

	/// `eth_signTypedData_v4` payload for `record`.
	pub fn typed_data(&self, record: &ForwardRequest) -> serde_json::Value {
		self.codec.typed_data_json(record)
	}

	/// Next nonce `identity` must present.
	pub async fn nonce(&self, identity: &Address) -> Result<U256, ForwardError> {
		Ok(self.nonces.next_expected(identity).await?)
	}

	pub fn domain(&self) -> &ForwarderDomain {
		self.codec.domain()
	}

	pub fn domain_separator(&self) -> B256 {
		self.codec.domain_separator()
	}

	/// Receipt of an executed request, if still retained.
	pub async fn receipt(&self, digest: &B256) -> Result<Option<ExecutionReceipt>, ForwardError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::Receipts, &digest.to_string())
			.await?)
	}

	pub fn relayer(&self) -> Address {
		self.relayer
	}

	pub fn targets(&self) -> &Arc<TargetService> {
		&self.targets
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	fn authenticate(
		&self,
		digest: &B256,
		record: &ForwardRequest,
		signature: &[u8],
	) -> Result<(), ForwardError> {
		let recovered = verifier::recover_signer(digest, signature)?;
		if recovered != record.from {
			return Err(ForwardError::Unauthorized {
				claimed: record.from,
				recovered,
			});
		}
		Ok(())
	}

	fn sender_lock(&self, sender: Address) -> Arc<Mutex<()>> {
		Arc::clone(
			self.sender_locks
				.entry(sender)
				.or_insert_with(|| Arc::new(Mutex::new(())))
				.value(),
		)
	}
}

/// Nonce consumption, dispatch and bookkeeping for one authenticated request.
struct Execution {
	nonces: Arc<NonceLedger>,
	storage: Arc<StorageService>,
	targets: Arc<TargetService>,
	event_bus: EventBus,
	relayer: Address,
	sender_locks: Arc<SenderLocks>,
}

impl Execution {
	async fn run(
		self,
		digest: B256,
		record: ForwardRequest,
		lock: Arc<Mutex<()>>,
	) -> Result<ExecutionResult, ForwardError> {
		let guard = lock.lock_owned().await;
		let result = self.advance_and_dispatch(digest, &record).await;

		drop(guard);
		self.sender_locks
			.remove_if(&record.from, |_, lock| Arc::strong_count(lock) == 1);

		result
	}

	async fn advance_and_dispatch(
		&self,
		digest: B256,
		record: &ForwardRequest,
	) -> Result<ExecutionResult, ForwardError> {
		if !self.nonces.try_advance(&record.from, record.nonce).await? {
			let expected = self.nonces.next_expected(&record.from).await?;
			let err = ForwardError::StaleOrFutureNonce {
				expected,
				presented: record.nonce,
			};
			publish_rejection(&self.event_bus, digest, record.from, &err);
			return Err(err);
		}

		let result = ExecutionResult::from(
			self.targets
				.dispatch(&record.to, record.from, &record.data)
				.await,
		);

		tracing::info!(
			digest = %truncate_id(&digest.to_string()),
			delivered = result.delivered,
			"Request forwarded"
		);

		let receipt = ExecutionReceipt {
			digest,
			from: record.from,
			to: record.to,
			nonce: record.nonce,
			delivered: result.delivered,
			return_data: result.return_data.clone(),
			relayer: self.relayer,
			executed_at: current_timestamp(),
		};
		// Receipts are best-effort once the dispatch has run.
		if let Err(e) = self
			.storage
			.store(StorageKey::Receipts, &digest.to_string(), &receipt)
			.await
		{
			tracing::error!(digest = %digest, error = %e, "Failed to store execution receipt");
		}

		self.event_bus
			.publish(ForwarderEvent::Executed {
				digest,
				from: record.from,
				to: record.to,
				nonce: record.nonce,
				delivered: result.delivered,
			})
			.ok();

		Ok(result)
	}
}

fn publish_rejection(event_bus: &EventBus, digest: B256, from: Address, err: &ForwardError) {
	tracing::warn!(digest = %truncate_id(&digest.to_string()), error = %err, "Request rejected");

	if let Some(reason) = err.rejection_reason() {
		event_bus
			.publish(ForwarderEvent::Rejected {
				digest,
				from,
				reason,
			})
			.ok();
	}
}
