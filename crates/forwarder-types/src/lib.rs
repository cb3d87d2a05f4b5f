//! Common types module for the meta-transaction forwarder.
//!
//! This module defines the data model shared by every forwarder component:
//! the signed forward request, the EIP-712 domain it is bound to, execution
//! results and receipts, API payloads and configuration validation helpers.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types published by the forwarder.
pub mod events;
/// Forward requests, signing domains and execution outcomes.
pub mod forward;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Redacting wrapper for private keys and other secrets.
pub mod secret_string;
/// Storage namespaces used by the forwarder.
pub mod storage;
/// Utility functions for encoding and formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use events::*;
pub use forward::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;

/// Identity of a principal (sender, relayer or target contract).
pub type Identity = Address;
