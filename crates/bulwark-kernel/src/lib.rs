//! Bulwark Kernel
//!
//! Contracts shared by every Bulwark component: the [`Operation`] being
//! protected, the per-call [`ExecutionContext`], lifecycle [`Hook`]s, the
//! circuit state enum and the error taxonomy. Implementations live in
//! `bulwark-foundation`.

// error module
pub mod error;
pub use error::{AttemptError, BoxError, ConfigError, ConfigResult};

// circuit state
pub mod circuit;
pub use circuit::CircuitState;

// execution context
pub mod context;
pub use context::ExecutionContext;

// operation contract
pub mod operation;
pub use operation::Operation;

// lifecycle hooks
pub mod hooks;
pub use hooks::{Hook, LifecycleEvent};

// builder argument validation
pub mod validation;

// settings file loading
#[cfg(feature = "config")]
pub mod config;
