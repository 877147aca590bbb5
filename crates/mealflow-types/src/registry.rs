//! Registry trait for self-registering implementations.
//!
//! Every pluggable implementation (store backend, payment gateway,
//! geocoder) provides a Registry struct implementing this trait, declaring
//! the name used in configuration files and a factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this
	/// implementation, for example "memory" for
	/// `store.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
