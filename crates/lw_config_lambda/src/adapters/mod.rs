use std::future::Future;

pub mod access_grant;
pub mod http;
pub mod lifecycle;
pub mod platform;
pub mod telemetry;

/// Drives an SDK future to completion from synchronous adapter code.
///
/// Must run on a multi-threaded runtime or on a blocking-pool thread.
pub(crate) fn block_on_current<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
