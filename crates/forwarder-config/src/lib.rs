//! Configuration module for the forwarder service.
//!
//! Configuration is loaded from TOML. `${VAR}` and `${VAR:-default}`
//! placeholders are resolved from the environment before parsing, and the
//! parsed configuration is validated before it is handed to the builder.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["domain.toml", "targets.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use alloy_primitives::Address;
use forwarder_types::ForwarderDomain;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use builders::ConfigBuilder;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the forwarder.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this forwarder instance.
	pub forwarder: ForwarderConfig,
	/// EIP-712 signing domain hashed into every request digest.
	pub domain: ForwarderDomain,
	/// Storage backend for nonces and receipts.
	pub storage: StorageConfig,
	/// Relayer account configuration.
	pub account: AccountConfig,
	/// Execution targets reachable through the forwarder.
	#[serde(default)]
	pub targets: TargetsConfig,
	/// HTTP API server configuration.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the forwarder instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwarderConfig {
	/// Unique identifier for this forwarder instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Configuration for the relayer account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for execution targets.
///
/// Entries are keyed by a unique name. Each table must carry an `address`
/// field naming the stable identity the target is reachable at, and may set
/// `implementation` to pick the factory (defaults to the entry name).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetsConfig {
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl TargetsConfig {
	/// Implementation name for the entry `name`.
	pub fn implementation_of<'a>(name: &'a str, value: &'a toml::Value) -> &'a str {
		value
			.get("implementation")
			.and_then(|v| v.as_str())
			.unwrap_or(name)
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the target address declared by each target implementation.
	pub fn target_addresses(&self) -> Result<HashMap<String, Address>, ConfigError> {
		self.targets
			.implementations
			.iter()
			.map(|(name, value)| Ok((name.clone(), target_address(name, value)?)))
			.collect()
	}

	/// Validates cross-section invariants that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.forwarder.id.is_empty() {
			return Err(ConfigError::Validation("Forwarder ID cannot be empty".into()));
		}

		if self.domain.name.is_empty() {
			return Err(ConfigError::Validation("Domain name cannot be empty".into()));
		}
		if self.domain.version.is_empty() {
			return Err(ConfigError::Validation("Domain version cannot be empty".into()));
		}
		if self.domain.chain_id == 0 {
			return Err(ConfigError::Validation("Domain chain_id must be non-zero".into()));
		}
		if self.domain.verifying_contract == Address::ZERO {
			return Err(ConfigError::Validation(
				"Domain verifying_contract cannot be the zero address".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}

		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		for (name, value) in &self.targets.implementations {
			if value
				.get("implementation")
				.is_some_and(|v| v.as_str().is_none_or(str::is_empty))
			{
				return Err(ConfigError::Validation(format!(
					"Target '{}' has an invalid 'implementation' field",
					name
				)));
			}
		}

		let mut seen = HashSet::new();
		for (name, address) in self.target_addresses()? {
			if address == self.domain.verifying_contract {
				return Err(ConfigError::Validation(format!(
					"Target '{}' cannot share the forwarder's own address {}",
					name, address
				)));
			}
			if !seen.insert(address) {
				return Err(ConfigError::Validation(format!(
					"Duplicate target address {} (target '{}')",
					address, name
				)));
			}
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

fn target_address(name: &str, value: &toml::Value) -> Result<Address, ConfigError> {
	let raw = value.get("address").and_then(|v| v.as_str()).ok_or_else(|| {
		ConfigError::Validation(format!("Target '{}' is missing an 'address' field", name))
	})?;
	raw.parse::<Address>().map_err(|e| {
		ConfigError::Validation(format!(
			"Target '{}' has invalid address '{}': {}",
			name, raw, e
		))
	})
}

/// Parses a TOML string, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		tracing::debug!(forwarder_id = %config.forwarder.id, "Validated configuration");
		Ok(config)
	}
}
