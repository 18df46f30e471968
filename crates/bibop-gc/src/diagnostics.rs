//! Structured tracing spans/events for collector phases and diagnostics.
//!
//! Grounded in `rudo-gc/src/tracing.rs`'s `GcId`/phase-span pattern, made
//! unconditional (the teacher gates this behind an optional `tracing`
//! feature; this crate takes `tracing` as a normal dependency so structured
//! logging is always available regardless of which other subsystems a given
//! build enables).

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{span, Level};

/// The three collector phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    /// Clear mark bits left over from the previous cycle.
    Clear,
    /// Scan stack, roots, and trace the worklist.
    Mark,
    /// Reclaim unmarked slots and retire empty pages.
    Sweep,
}

/// Stable identifier correlating every event within a single collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcId(pub u64);

static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

/// Generate the next unique collection id.
pub fn next_gc_id() -> GcId {
    GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
}

/// Open a span covering an entire `collect()` call.
pub fn trace_collection(gc_id: GcId, forced: bool) -> span::EnteredSpan {
    span!(Level::DEBUG, "gc_collect", gc_id = gc_id.0, forced).entered()
}

/// Log the start of a collector phase.
pub fn log_phase_start(phase: GcPhase, bytes_before: usize) {
    tracing::debug!(phase = ?phase, bytes_before, "phase_start");
}

/// Log the end of a collector phase.
pub fn log_phase_end(phase: GcPhase, bytes_reclaimed: usize) {
    tracing::debug!(phase = ?phase, bytes_reclaimed, "phase_end");
}

/// Log a soft error: unrooting an address that was never registered is not
/// fatal, just worth a diagnostic.
pub fn log_unroot_not_found(addr: usize) {
    tracing::warn!(addr, "unroot: address was not registered as a root");
}
