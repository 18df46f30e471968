//! Error types for the public surface.
//!
//! Only `init` has a recoverable failure path; every other fatal condition
//! (OOM on metadata, a second consecutive OOM on region/page allocation)
//! terminates the process, matching the teacher's use of
//! `std::alloc::handle_alloc_error` for unrecoverable allocation failures
//! rather than threading a `Result` through every call site.

use thiserror::Error;

/// Failure to bring the collector singleton up.
#[derive(Debug, Error)]
pub enum GcError {
    /// `init` was called while the collector singleton was already live.
    #[error("garbage collector is already initialized")]
    AlreadyInitialized,

    /// `stack_top_hint` was the null address.
    #[error("stack_top_hint must be a non-null address")]
    NullStackTopHint,
}
