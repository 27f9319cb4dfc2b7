//! Retry policies
//!
//! [`RetryPolicy`] classifies settled values (abort, forced retry or
//! accept), bounds the number of attempts and computes the delay before
//! each retry from a [`BackOff`] strategy.

pub mod backoff;
pub mod policy;

pub use backoff::BackOff;
pub use policy::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, RetryPolicyBuilder, UNBOUNDED};
