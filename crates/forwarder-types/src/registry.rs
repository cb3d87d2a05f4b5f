//! Registry trait for self-registering implementations.
//!
//! Storage backends, accounts and execution targets each ship a `Registry`
//! struct naming the configuration key they answer to and the factory that
//! builds them.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// Examples:
	/// - "memory" for storage.implementations.memory
	/// - "local" for account.implementations.local
	/// - "token" for targets.implementations.token
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
