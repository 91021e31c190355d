//! Adapters from foreign failures into the taxonomy.

use std::future::Future;

use crate::error::BoxError;
use crate::{Error, Result};

/// Await `operation`, turning any failure into an `InternalError` that keeps
/// the original error as its source. Failures that already are [`Error`]s
/// pass through unchanged.
pub async fn wrap_async<Fut, T, E>(operation: Fut) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxError>,
{
    operation.await.map_err(|e| {
        let boxed: BoxError = e.into();
        match boxed.downcast::<Error>() {
            Ok(ours) => *ours,
            Err(other) => Error::internal(other.to_string(), other),
        }
    })
}

/// Like [`wrap_async`], with a custom mapping to a specific error kind.
pub async fn wrap_async_with<Fut, T, E, M>(operation: Fut, transform: M) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    M: FnOnce(E) -> Error,
{
    operation.await.map_err(transform)
}
