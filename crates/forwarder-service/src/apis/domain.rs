//! Signing domain and digest endpoints.
//!
//! Wallets that cannot build EIP-712 payloads themselves fetch the typed data
//! for a request here, sign it, and hand the signature to a relayer.

use forwarder_core::Forwarder;
use forwarder_types::{DigestResponse, DomainResponse, ForwardRequest};

pub fn get_domain(forwarder: &Forwarder) -> DomainResponse {
	let domain = forwarder.domain();
	DomainResponse {
		name: domain.name.clone(),
		version: domain.version.clone(),
		chain_id: domain.chain_id,
		verifying_contract: domain.verifying_contract,
		separator: forwarder.domain_separator(),
	}
}

pub fn get_digest(forwarder: &Forwarder, request: &ForwardRequest) -> DigestResponse {
	DigestResponse {
		digest: forwarder.digest(request),
		typed_data: forwarder.typed_data(request),
	}
}
