//! Execution drivers: run the planned statements against a live connection
//!
//! The drivers are the only mutators of the graph's runtime status fields
//! and the only code that suspends: every statement and COPY stream races
//! against the run's cancellation token.

pub mod csv;
pub mod export;
pub mod import;

pub use export::Export;
pub use import::Import;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{SubsetError, SubsetResult};

/// Race a database call against the cancellation signal. The losing future
/// is dropped, which aborts the in-flight call on the wire.
pub(crate) async fn with_cancel<T>(
    token: &CancellationToken,
    fut: impl Future<Output = SubsetResult<T>>,
) -> SubsetResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SubsetError::Cancelled),
        res = fut => res,
    }
}
