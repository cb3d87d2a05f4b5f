//! File-backed storage.
//!
//! Each key is one file under the storage directory. Files start with a fixed
//! header carrying an expiry timestamp, and writes go through a temp file plus
//! rename so a crash never leaves a half-written nonce counter behind.
//!
//! The directory is locked exclusively for the lifetime of the backend: two
//! forwarder processes sharing one nonce directory could both accept the same
//! nonce.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use forwarder_types::{
	utils::current_timestamp, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	StorageKey, ValidationError,
};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Fixed-size file header.
///
/// Binary layout (32 bytes total):
/// - [0-3]: Magic bytes "FWDS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-31]: Reserved
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"FWDS";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			current_timestamp().saturating_add(ttl.as_secs().max(1))
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && current_timestamp() >= self.expires_at
	}
}

/// Default TTLs per storage namespace, read from `ttl_<namespace>` keys.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		for storage_key in StorageKey::all().filter(StorageKey::allows_ttl) {
			let config_key = format!("ttl_{}", storage_key.as_str());
			if let Some(seconds) = config.get(&config_key).and_then(|v| v.as_integer()) {
				ttls.insert(storage_key, Duration::from_secs(seconds.max(0) as u64));
			}
		}

		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
	/// Held for the backend's lifetime; dropping it releases the directory lock.
	_lock: File,
}

impl FileStorage {
	/// Opens (creating if needed) a storage directory and locks it exclusively.
	pub fn open(base_path: PathBuf, ttl_config: TtlConfig) -> Result<Self, StorageError> {
		std::fs::create_dir_all(&base_path).map_err(|e| {
			StorageError::Backend(format!(
				"Cannot create storage directory {}: {}",
				base_path.display(),
				e
			))
		})?;

		let lock = File::create(base_path.join(".lock"))
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		lock.try_lock_exclusive().map_err(|_| {
			StorageError::Backend(format!(
				"Storage directory {} is in use by another process",
				base_path.display()
			))
		})?;

		tracing::debug!(path = %base_path.display(), "Opened file storage");

		Ok(Self {
			base_path,
			ttl_config,
			_lock: lock,
		})
	}

	/// Maps a `namespace:id` key to `<base>/<namespace>/<id>.bin`.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("default", key));
		let safe_id = id.replace(['/', '\\', ':', '.'], "_");
		self.base_path
			.join(namespace)
			.join(format!("{}.bin", safe_id))
	}

	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	async fn read_live(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
		let data = match fs::read(path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}

		Ok(data[FileHeader::SIZE..].to_vec())
	}

	async fn cleanup_dir(&self, dir: &Path) -> Result<usize, StorageError> {
		let mut entries = match fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut removed = 0;
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}

			let expired = match fs::read(&path).await {
				Ok(data) => FileHeader::deserialize(&data).is_ok_and(|h| h.is_expired()),
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
					false
				},
			};

			if expired {
				match fs::remove_file(&path).await {
					Ok(()) => removed += 1,
					Err(e) => {
						tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired file")
					},
				}
			}
		}

		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_live(&self.get_file_path(key)).await
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let header = FileHeader::new(ttl);

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.read_live(&self.get_file_path(key)).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		for storage_key in StorageKey::all().filter(StorageKey::allows_ttl) {
			removed += self
				.cleanup_dir(&self.base_path.join(storage_key.as_str()))
				.await?;
		}
		Ok(removed)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];

		for storage_key in StorageKey::all() {
			let field = format!("ttl_{}", storage_key.as_str());
			if !storage_key.allows_ttl() {
				if config.get(&field).is_some() {
					return Err(ValidationError::InvalidValue {
						field,
						message: format!("{} never expire", storage_key.as_str()),
					});
				}
				continue;
			}
			optional_fields.push(Field::new(
				field,
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory (default: "./data/forwarder")
/// - `ttl_receipts`: TTL in seconds for execution receipts (default: 0, keep forever)
///
/// Nonce counters are always kept; `ttl_nonces` is rejected.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/forwarder");

	Ok(Box::new(FileStorage::open(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)?))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn open(dir: &TempDir) -> FileStorage {
		FileStorage::open(dir.path().to_path_buf(), TtlConfig::default()).unwrap()
	}

	#[test]
	fn test_header_layout() {
		let header = FileHeader::new(Duration::ZERO);
		let bytes = header.serialize();
		assert_eq!(&bytes[0..4], b"FWDS");
		assert_eq!(FileHeader::deserialize(&bytes).unwrap(), header);
		assert!(!header.is_expired());

		assert!(FileHeader::deserialize(b"nope").is_err());
	}

	#[tokio::test]
	async fn test_basic_operations() {
		let dir = TempDir::new().unwrap();
		let storage = open(&dir);

		let key = "nonces:0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
		storage.set_bytes(key, b"\"5\"".to_vec(), None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), b"\"5\"".to_vec());
		assert!(storage.exists(key).await.unwrap());
		assert!(dir
			.path()
			.join("nonces/0x70997970C51812dc3A010C7d01b50e0d17dc79C8.bin")
			.exists());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
		// Deleting twice is fine
		storage.delete(key).await.unwrap();
	}

	#[tokio::test]
	async fn test_values_survive_reopen() {
		let dir = TempDir::new().unwrap();
		{
			let storage = open(&dir);
			storage
				.set_bytes("nonces:alice", b"\"9\"".to_vec(), None)
				.await
				.unwrap();
		}

		let reopened = open(&dir);
		assert_eq!(
			reopened.get_bytes("nonces:alice").await.unwrap(),
			b"\"9\"".to_vec()
		);
	}

	#[test]
	fn test_directory_lock_is_exclusive() {
		let dir = TempDir::new().unwrap();
		let _first = open(&dir);
		let second = FileStorage::open(dir.path().to_path_buf(), TtlConfig::default());
		assert!(matches!(second, Err(StorageError::Backend(msg)) if msg.contains("in use")));
	}

	#[tokio::test]
	async fn test_expired_receipts_are_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = open(&dir);

		// Write a header that expired in the past
		let path = storage.get_file_path("receipts:old");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		let mut data = FileHeader {
			version: 1,
			expires_at: 1,
		}
		.serialize()
		.to_vec();
		data.extend_from_slice(b"{}");
		std::fs::write(&path, data).unwrap();

		storage
			.set_bytes("receipts:new", b"{}".to_vec(), None)
			.await
			.unwrap();

		assert!(matches!(
			storage.get_bytes("receipts:old").await,
			Err(StorageError::NotFound)
		));
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(storage.exists("receipts:new").await.unwrap());
	}

	#[test]
	fn test_ttl_config_from_toml() {
		let config: toml::Value = toml::from_str("ttl_receipts = 120").unwrap();
		let ttls = TtlConfig::from_config(&config);
		assert_eq!(ttls.get_ttl(StorageKey::Receipts), Duration::from_secs(120));
		assert_eq!(ttls.get_ttl(StorageKey::Nonces), Duration::ZERO);
	}

	#[test]
	fn test_nonce_ttl_is_refused() {
		let dir = TempDir::new().unwrap();
		let config: toml::Value = toml::from_str(&format!(
			"storage_path = \"{}\"\nttl_nonces = 1",
			dir.path().display()
		))
		.unwrap();

		assert!(FileStorageSchema.validate(&config).is_err());
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}

	#[test]
	fn test_schema_rejects_negative_ttl() {
		let config: toml::Value = toml::from_str("ttl_receipts = -5").unwrap();
		assert!(FileStorageSchema.validate(&config).is_err());
	}
}
