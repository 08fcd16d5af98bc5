use futures::future::BoxFuture;
use tagplus_core::{Catalog, Tx};

use crate::error::SyncError;

/// Runs `work` inside one catalog transaction.
///
/// Commits when `work` returns `Ok` and rolls back when it returns `Err`.
/// If the future is dropped midway the transaction is dropped uncommitted,
/// which discards its writes.
///
/// ```ignore
/// let change = atomic(catalog, move |tx| {
///     Box::pin(async move { mapper.create(tx, &category).await })
/// })
/// .await?;
/// ```
///
/// # Errors
///
/// Returns the error from `work`, or [`SyncError::Store`] if the transaction
/// cannot be opened or committed.
pub async fn atomic<T, F>(catalog: &dyn Catalog, work: F) -> Result<T, SyncError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<T, SyncError>>,
{
    let mut tx = catalog.begin().await?;
    match work(tx.as_mut()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(error = %rollback_error, "catalog transaction rollback failed");
            }
            Err(error)
        }
    }
}
