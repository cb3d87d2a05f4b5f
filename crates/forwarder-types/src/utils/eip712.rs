//! Generic EIP-712 utilities.
//!
//! These helpers provide:
//! - Domain separator computation for the four-field domain
//! - Final digest computation (0x1901 || domainHash || structHash)
//! - A minimal ABI encoder for the static words used in struct hashing

use crate::ForwarderDomain;
use alloy_primitives::{keccak256, Address, B256, U256};

pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Compute the EIP-712 domain separator:
/// keccak256(abi.encode(typeHash, nameHash, versionHash, chainId, verifyingContract)).
pub fn compute_domain_hash(domain: &ForwarderDomain) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_string(&domain.name);
	enc.push_string(&domain.version);
	enc.push_u256(U256::from(domain.chain_id));
	enc.push_address(&domain.verifying_contract);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for EIP-712 struct hashing.
///
/// Every push appends exactly one 32-byte word. Dynamic `string` and `bytes`
/// members are encoded as the keccak256 of their contents.
#[derive(Debug, Default)]
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self { buf: Vec::new() }
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	pub fn push_string(&mut self, s: &str) {
		self.push_b256(&keccak256(s.as_bytes()));
	}

	pub fn push_bytes(&mut self, data: &[u8]) {
		self.push_b256(&keccak256(data));
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_sol_types::Eip712Domain;

	#[test]
	fn test_domain_hash_matches_alloy() {
		let domain = ForwarderDomain {
			name: "MinimalForwarder".to_string(),
			version: "0.0.1".to_string(),
			chain_id: 31337,
			verifying_contract: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
		};

		let expected = Eip712Domain::new(
			Some("MinimalForwarder".into()),
			Some("0.0.1".into()),
			Some(U256::from(31337u64)),
			Some(domain.verifying_contract),
			None,
		)
		.separator();

		assert_eq!(compute_domain_hash(&domain), expected);
	}

	#[test]
	fn test_encoder_left_pads_addresses() {
		let addr = address!("0x00000000000000000000000000000000000000ff");
		let mut enc = Eip712AbiEncoder::new();
		enc.push_address(&addr);
		let word = enc.finish();

		assert_eq!(word.len(), 32);
		assert!(word[..31].iter().all(|b| *b == 0));
		assert_eq!(word[31], 0xff);
	}
}
