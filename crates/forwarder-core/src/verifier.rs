//! secp256k1 signer recovery.
//!
//! Signatures are the 65-byte `r || s || v` form. `v` may be 0/1 or 27/28.
//! Upper-half `s` values are rejected (EIP-2), so each authorization has
//! exactly one accepted encoding.

use alloy_primitives::{uint, Address, Signature, B256, U256};
use thiserror::Error;

/// secp256k1 group order divided by two.
const SECP256K1_HALF_ORDER: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
}

fn malformed(message: impl Into<String>) -> VerifyError {
	VerifyError::MalformedSignature(message.into())
}

/// Recovers the identity that produced `signature` over `digest`.
pub fn recover_signer(digest: &B256, signature: &[u8]) -> Result<Address, VerifyError> {
	if signature.len() != 65 {
		return Err(malformed(format!(
			"expected 65 bytes, got {}",
			signature.len()
		)));
	}

	let y_parity = match signature[64] {
		0 | 27 => false,
		1 | 28 => true,
		v => return Err(malformed(format!("invalid recovery id {}", v))),
	};

	let r = U256::from_be_slice(&signature[..32]);
	let s = U256::from_be_slice(&signature[32..64]);
	if r.is_zero() || s.is_zero() {
		return Err(malformed("zero r or s"));
	}
	if s > SECP256K1_HALF_ORDER {
		return Err(malformed("s is in the upper half of the curve order"));
	}

	Signature::new(r, s, y_parity)
		.recover_address_from_prehash(digest)
		.map_err(|e| malformed(e.to_string()))
}

/// Checks whether `signature` over `digest` was produced by `claimed`.
///
/// A well-formed signature from another key is `Ok(false)`.
pub fn verify(digest: &B256, signature: &[u8], claimed: &Address) -> Result<bool, VerifyError> {
	Ok(recover_signer(digest, signature)? == *claimed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::keccak256;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;

	fn sign(digest: &B256) -> (PrivateKeySigner, Vec<u8>) {
		let signer = PrivateKeySigner::random();
		let signature = signer.sign_hash_sync(digest).unwrap();
		(signer, signature.as_bytes().to_vec())
	}

	#[test]
	fn test_recovers_signer() {
		let digest = keccak256(b"request");
		let (signer, sig) = sign(&digest);

		assert_eq!(recover_signer(&digest, &sig).unwrap(), signer.address());
		assert!(verify(&digest, &sig, &signer.address()).unwrap());
		assert!(!verify(&digest, &sig, &Address::repeat_byte(9)).unwrap());
	}

	#[test]
	fn test_accepts_both_v_conventions() {
		let digest = keccak256(b"request");
		let (signer, mut sig) = sign(&digest);

		sig[64] -= 27;
		assert_eq!(recover_signer(&digest, &sig).unwrap(), signer.address());
	}

	#[test]
	fn test_rejects_malformed_input() {
		let digest = keccak256(b"request");
		let (_, sig) = sign(&digest);

		assert!(matches!(
			recover_signer(&digest, &sig[..64]),
			Err(VerifyError::MalformedSignature(_))
		));

		let mut bad_v = sig.clone();
		bad_v[64] = 5;
		assert!(recover_signer(&digest, &bad_v).is_err());

		let mut zero_r = sig.clone();
		zero_r[..32].fill(0);
		assert!(recover_signer(&digest, &zero_r).is_err());
	}

	#[test]
	fn test_rejects_high_s_twin() {
		let digest = keccak256(b"request");
		let (_, sig) = sign(&digest);

		// n - s with flipped parity recovers the same key but must be refused
		let n = SECP256K1_HALF_ORDER * U256::from(2u64) + U256::from(1u64);
		let s = U256::from_be_slice(&sig[32..64]);
		let mut twin = sig.clone();
		twin[32..64].copy_from_slice(&(n - s).to_be_bytes::<32>());
		twin[64] = if sig[64] == 27 { 28 } else { 27 };

		assert!(matches!(
			recover_signer(&digest, &twin),
			Err(VerifyError::MalformedSignature(m)) if m.contains("upper half")
		));
	}
}
