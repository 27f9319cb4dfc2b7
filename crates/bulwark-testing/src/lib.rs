//! Test doubles for Bulwark: a scripted [`Operation`](bulwark_kernel::Operation)
//! and a recorder for lifecycle hooks and breaker transitions.

pub mod operation;
pub mod recorder;

pub use operation::{ScriptedOperation, Step};
pub use recorder::{HookRecord, HookRecorder};
