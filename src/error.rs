//! Library-level failures.
//!
//! Streams carry their own error type (`Observable::Err`). `RxError` only
//! covers what can go wrong while building the execution machinery itself,
//! such as spawning the threads behind an event loop.

/// Errors raised while constructing schedulers or coordinations.
#[derive(Debug, thiserror::Error)]
pub enum RxError {
  /// The OS refused to start a run-loop thread.
  #[error("failed to spawn run loop thread `{name}`")]
  SpawnThread {
    /// Name the thread would have carried.
    name: String,
    #[source]
    source: std::io::Error,
  },

  /// An event loop was configured without any thread to run on.
  #[error("an event loop needs at least one thread")]
  NoThreads,
}
