//! Time-series sink capability consumed by the scheduler.

use crate::storage::StorageError;
use crate::storage::types::Point;

/// Destination for collected points.
///
/// The scheduler owns the sink exclusively and calls [`connect`](Self::connect)
/// before every due group, then hands it one batch per group.
#[async_trait::async_trait]
pub trait TimeSeriesSink: Send + Sync {
    /// (Re)establish the sink session.
    ///
    /// # Errors
    /// Returns `StorageError::Connection` if the sink is unreachable.
    async fn connect(&mut self) -> Result<(), StorageError>;

    /// Persist a batch of points. An empty batch is a no-op.
    ///
    /// # Errors
    /// Returns `StorageError::Write` if the sink rejects the batch.
    async fn write(&self, points: &[Point]) -> Result<(), StorageError>;
}
