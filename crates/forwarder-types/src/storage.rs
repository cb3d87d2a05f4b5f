//! Storage namespaces used by the forwarder.

use std::str::FromStr;

/// Storage keys for the forwarder's persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Next expected nonce per sender identity.
	Nonces,
	/// Execution receipts keyed by request digest.
	Receipts,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Nonces => "nonces",
			StorageKey::Receipts => "receipts",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Nonces, Self::Receipts].into_iter()
	}

	/// Whether entries in this namespace may carry a time-to-live.
	///
	/// Nonce counters never expire: a counter that disappears restarts at 0
	/// and makes already-executed requests valid again.
	pub fn allows_ttl(&self) -> bool {
		match self {
			StorageKey::Nonces => false,
			StorageKey::Receipts => true,
		}
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"nonces" => Ok(Self::Nonces),
			"receipts" => Ok(Self::Receipts),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_key_round_trips_through_str() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("orders".parse::<StorageKey>().is_err());
	}

	#[test]
	fn test_nonces_never_expire() {
		assert!(!StorageKey::Nonces.allows_ttl());
		assert!(StorageKey::Receipts.allows_ttl());
	}
}
