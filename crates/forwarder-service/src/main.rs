//! Main entry point for the forwarder service.
//!
//! `forwarder serve` runs the relayer-facing HTTP API on top of a forwarder
//! assembled from configuration. `forwarder sign` stands in for a wallet: it
//! signs a forward request under the configured domain and prints the
//! submission a relayer would post.

use alloy_primitives::{Address, Bytes, U256};
use clap::{Args, Parser, Subcommand};
use forwarder_account::{implementations::local::LocalWallet, AccountInterface};
use forwarder_config::Config;
use forwarder_core::{codec, Forwarder, ForwarderBuilder, ForwarderFactories};
use forwarder_types::{with_0x_prefix, ForwardRequest, ForwardSubmission, SecretString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod apis;
mod server;

/// Command-line interface for the forwarder service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Command>,

	#[command(flatten)]
	common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the forwarder API (default)
	Serve,
	/// Sign a forward request and print the submission
	Sign(SignArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
	/// Path to configuration file
	#[arg(short, long, global = true, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, global = true, default_value = "info")]
	log_level: String,
}

#[derive(Args, Debug)]
struct SignArgs {
	/// Sender private key (hex)
	#[arg(long, env = "FORWARDER_SENDER_KEY")]
	private_key: String,

	/// Target identity
	#[arg(long)]
	to: Address,

	/// Nonce to sign (decimal or 0x-hex)
	#[arg(long, default_value = "0")]
	nonce: String,

	/// Call payload (hex)
	#[arg(long, default_value = "0x")]
	data: Bytes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(cli.common.log_level.clone()));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = cli.common.config.to_string_lossy().to_string();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.forwarder.id);

	match cli.command {
		Some(Command::Sign(args)) => sign(&config, args).await,
		Some(Command::Serve) | None => serve(config).await,
	}
}

/// Builds the forwarder and serves the API until interrupted.
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let forwarder = Arc::new(build_forwarder(config.clone()).await?);

	let cleanup = tokio::spawn(run_storage_cleanup(
		Arc::clone(&forwarder),
		Duration::from_secs(config.storage.cleanup_interval_seconds),
	));

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, Arc::clone(&forwarder)) => {
					tracing::info!("API server finished");
					result?;
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Received shutdown signal");
				}
			}
		},
		None => {
			tracing::warn!("API disabled; forwarder is idle until interrupted");
			tokio::signal::ctrl_c().await?;
		},
	}

	cleanup.abort();
	tracing::info!("Stopped forwarder");
	Ok(())
}

/// Builds the forwarder with every shipped implementation available.
async fn build_forwarder(config: Config) -> Result<Forwarder, Box<dyn std::error::Error>> {
	Ok(ForwarderBuilder::new(config)
		.build(ForwarderFactories::all())
		.await?)
}

/// Periodically removes expired receipts from storage.
async fn run_storage_cleanup(forwarder: Arc<Forwarder>, interval: Duration) {
	let mut ticker = tokio::time::interval(interval);
	// First tick completes immediately
	ticker.tick().await;

	loop {
		ticker.tick().await;
		match forwarder.storage().cleanup_expired().await {
			Ok(0) => {},
			Ok(removed) => tracing::debug!(component = "storage", removed, "Removed expired entries"),
			Err(e) => tracing::warn!(component = "storage", error = %e, "Storage cleanup failed"),
		}
	}
}

fn parse_nonce(value: &str) -> Result<U256, String> {
	let parsed = match value.strip_prefix("0x") {
		Some(hex) => U256::from_str_radix(hex, 16),
		None => U256::from_str_radix(value, 10),
	};
	parsed.map_err(|e| format!("Invalid nonce '{}': {}", value, e))
}

/// Signs a request under the configured domain and prints the submission.
async fn sign(config: &Config, args: SignArgs) -> Result<(), Box<dyn std::error::Error>> {
	let wallet = LocalWallet::new(&SecretString::from(with_0x_prefix(&args.private_key)))?;
	let request = ForwardRequest::new(
		wallet.address().await?,
		args.to,
		parse_nonce(&args.nonce)?,
		args.data,
	);

	let digest = codec::encode(&config.domain, &request);
	let signature = wallet.sign_digest(&digest).await?;

	let output = serde_json::json!({
		"digest": digest,
		"submission": ForwardSubmission { request, signature },
	});
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use forwarder_config::ConfigBuilder;

	#[test]
	fn test_cli_defaults_to_serve() {
		let cli = Cli::parse_from(["forwarder"]);
		assert!(cli.command.is_none());
		assert_eq!(cli.common.config, PathBuf::from("config.toml"));
		assert_eq!(cli.common.log_level, "info");
	}

	#[test]
	fn test_sign_arguments() {
		let cli = Cli::parse_from([
			"forwarder",
			"sign",
			"--config",
			"demo.toml",
			"--private-key",
			"0x01",
			"--to",
			"0x5FbDB2315678afecb367f032d93F642f64180aa3",
			"--nonce",
			"0x10",
			"--data",
			"0xdeadbeef",
		]);

		let Some(Command::Sign(args)) = cli.command else {
			panic!("expected sign subcommand");
		};
		assert_eq!(cli.common.config, PathBuf::from("demo.toml"));
		assert_eq!(parse_nonce(&args.nonce).unwrap(), U256::from(16u64));
		assert_eq!(args.data, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
	}

	#[test]
	fn test_parse_nonce() {
		assert_eq!(parse_nonce("42").unwrap(), U256::from(42u64));
		assert!(parse_nonce("forty-two").is_err());
	}

	#[tokio::test]
	async fn test_demo_config_loads() {
		let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/demo.toml");
		let config = Config::from_file(path).await.unwrap();

		assert_eq!(config.forwarder.id, "forwarder-local");
		assert_eq!(config.storage.primary, "file");
		assert_eq!(config.target_addresses().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_build_from_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let storage_path = dir.path().join("data");
		let config_path = dir.path().join("forwarder.toml");
		let contents = format!(
			r#"
[forwarder]
id = "forwarder-test"

[domain]
name = "MinimalForwarder"
version = "0.0.1"
chain_id = 31337
verifying_contract = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

[storage]
primary = "file"
cleanup_interval_seconds = 60

[storage.implementations.file]
storage_path = "{}"

[account]
primary = "local"

[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[targets.implementations.token]
address = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
"#,
			storage_path.display()
		);
		std::fs::write(&config_path, contents).unwrap();

		let config = Config::from_file(&config_path.to_string_lossy())
			.await
			.unwrap();
		let forwarder = build_forwarder(config).await.unwrap();

		assert_eq!(forwarder.targets().addresses().count(), 1);
		assert!(storage_path.exists());
	}

	#[tokio::test]
	async fn test_signed_submission_verifies() {
		let config = ConfigBuilder::new().build();
		let forwarder = build_forwarder(config.clone()).await.unwrap();

		let wallet = LocalWallet::new(&SecretString::from(
			"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
		))
		.unwrap();
		let request = ForwardRequest::new(
			wallet.address().await.unwrap(),
			Address::repeat_byte(7),
			U256::ZERO,
			Bytes::new(),
		);
		let signature = wallet
			.sign_digest(&codec::encode(&config.domain, &request))
			.await
			.unwrap();

		forwarder.verify(&request, &signature).await.unwrap();
	}
}
