//! The unit of work wrapped by an orchestrator.
//!
//! Anything that can be invoked with no arguments and asynchronously yields
//! `Result<T, E>` is an [`Operation`]. Closures returning futures get an
//! implementation for free:
//!
//! ```rust,ignore
//! use bulwark_kernel::operation::Operation;
//!
//! let op = || async { Ok::<_, std::io::Error>(42) };
//! assert_eq!(op.invoke().await.unwrap(), 42);
//! ```
//!
//! An operation may be invoked many times (once per attempt) and may be
//! invoked concurrently by different `execute` calls, so it takes `&self`.

use crate::error::BoxError;
use async_trait::async_trait;
use std::future::Future;

/// A zero-argument, possibly asynchronous, fallible unit of work.
#[async_trait]
pub trait Operation<T>: Send + Sync {
    /// Run the operation once.
    async fn invoke(&self) -> Result<T, BoxError>;
}

#[async_trait]
impl<T, E, F, Fut> Operation<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
    T: Send + 'static,
{
    async fn invoke(&self) -> Result<T, BoxError> {
        (self)().await.map_err(Into::into)
    }
}
