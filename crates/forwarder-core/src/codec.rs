//! EIP-712 encoding of forward requests.
//!
//! The digest a sender signs is
//! `keccak256(0x1901 || domainSeparator || structHash)` where the struct hash
//! covers `ForwardRequest(address from,address to,uint256 nonce,bytes data)`.
//! Any change to a field, to the type string, or to the domain yields a
//! different digest.

use alloy_primitives::{keccak256, B256};
use forwarder_types::{
	utils::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder},
	ForwardRequest, ForwarderDomain,
};
use serde_json::json;

/// EIP-712 type string of a forward request.
pub const FORWARD_REQUEST_TYPE: &str =
	"ForwardRequest(address from,address to,uint256 nonce,bytes data)";

/// Domain separator of `domain`.
pub fn domain_separator(domain: &ForwarderDomain) -> B256 {
	compute_domain_hash(domain)
}

/// EIP-712 struct hash of a request.
pub fn struct_hash(record: &ForwardRequest) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(FORWARD_REQUEST_TYPE.as_bytes()));
	enc.push_address(&record.from);
	enc.push_address(&record.to);
	enc.push_u256(record.nonce);
	enc.push_bytes(&record.data);
	keccak256(enc.finish())
}

/// Digest a sender signs to authorize `record` under `domain`.
pub fn encode(domain: &ForwarderDomain, record: &ForwardRequest) -> B256 {
	compute_final_digest(&domain_separator(domain), &struct_hash(record))
}

/// `eth_signTypedData_v4` payload for `record` under `domain`.
pub fn typed_data_json(domain: &ForwarderDomain, record: &ForwardRequest) -> serde_json::Value {
	json!({
		"types": {
			"EIP712Domain": [
				{ "name": "name", "type": "string" },
				{ "name": "version", "type": "string" },
				{ "name": "chainId", "type": "uint256" },
				{ "name": "verifyingContract", "type": "address" }
			],
			"ForwardRequest": [
				{ "name": "from", "type": "address" },
				{ "name": "to", "type": "address" },
				{ "name": "nonce", "type": "uint256" },
				{ "name": "data", "type": "bytes" }
			]
		},
		"primaryType": "ForwardRequest",
		"domain": {
			"name": domain.name,
			"version": domain.version,
			"chainId": domain.chain_id,
			"verifyingContract": domain.verifying_contract.to_string()
		},
		"message": {
			"from": record.from.to_string(),
			"to": record.to.to_string(),
			"nonce": record.nonce.to_string(),
			"data": record.data.to_string()
		}
	})
}

/// Codec bound to one domain, with the separator computed once.
#[derive(Debug, Clone)]
pub struct StructuredMessageCodec {
	domain: ForwarderDomain,
	separator: B256,
}

impl StructuredMessageCodec {
	pub fn new(domain: ForwarderDomain) -> Self {
		let separator = domain_separator(&domain);
		Self { domain, separator }
	}

	pub fn domain(&self) -> &ForwarderDomain {
		&self.domain
	}

	pub fn domain_separator(&self) -> B256 {
		self.separator
	}

	pub fn encode(&self, record: &ForwardRequest) -> B256 {
		compute_final_digest(&self.separator, &struct_hash(record))
	}

	pub fn typed_data_json(&self, record: &ForwardRequest) -> serde_json::Value {
		typed_data_json(&self.domain, record)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address, Bytes, U256};
	use alloy_sol_types::{Eip712Domain, SolStruct};

	mod sol_types {
		alloy_sol_types::sol! {
			struct ForwardRequest {
				address from;
				address to;
				uint256 nonce;
				bytes data;
			}
		}
	}

	fn domain() -> ForwarderDomain {
		ForwarderDomain {
			name: "MinimalForwarder".to_string(),
			version: "0.0.1".to_string(),
			chain_id: 31337,
			verifying_contract: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
		}
	}

	fn record() -> ForwardRequest {
		ForwardRequest::new(
			address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
			address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
			U256::from(7u64),
			vec![0xa9, 0x05, 0x9c, 0xbb, 0x01],
		)
	}

	#[test]
	fn test_digest_matches_alloy_eip712() {
		let d = domain();
		let r = record();

		let alloy_domain = Eip712Domain::new(
			Some(d.name.clone().into()),
			Some(d.version.clone().into()),
			Some(U256::from(d.chain_id)),
			Some(d.verifying_contract),
			None,
		);
		let alloy_record = sol_types::ForwardRequest {
			from: r.from,
			to: r.to,
			nonce: r.nonce,
			data: r.data.clone(),
		};

		assert_eq!(struct_hash(&r), alloy_record.eip712_hash_struct());
		assert_eq!(encode(&d, &r), alloy_record.eip712_signing_hash(&alloy_domain));
		assert_eq!(
			FORWARD_REQUEST_TYPE,
			sol_types::ForwardRequest::eip712_encode_type()
		);
	}

	#[test]
	fn test_every_field_changes_digest() {
		let d = domain();
		let base = encode(&d, &record());

		let mut r = record();
		r.from = Address::repeat_byte(1);
		assert_ne!(encode(&d, &r), base);

		let mut r = record();
		r.to = Address::repeat_byte(2);
		assert_ne!(encode(&d, &r), base);

		let mut r = record();
		r.nonce += U256::from(1u64);
		assert_ne!(encode(&d, &r), base);

		let mut r = record();
		r.data = Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, 0x02]);
		assert_ne!(encode(&d, &r), base);

		let mut other = domain();
		other.chain_id = 1;
		assert_ne!(encode(&other, &record()), base);
	}

	#[test]
	fn test_codec_caches_separator() {
		let codec = StructuredMessageCodec::new(domain());
		assert_eq!(codec.domain_separator(), domain_separator(&domain()));
		assert_eq!(codec.encode(&record()), encode(&domain(), &record()));
	}

	#[test]
	fn test_typed_data_shape() {
		let typed = typed_data_json(&domain(), &record());
		assert_eq!(typed["primaryType"], "ForwardRequest");
		assert_eq!(typed["domain"]["chainId"], 31337);
		assert_eq!(typed["message"]["nonce"], "7");
		assert_eq!(typed["message"]["data"], "0xa9059cbb01");
	}
}
