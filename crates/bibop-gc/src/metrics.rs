//! Collector statistics, for `debug_stats`.
//!
//! Grounded in `rudo-gc/src/metrics.rs`'s `GcMetrics` (a plain `Copy` struct
//! of collection counters), simplified from that module's thread-local
//! "metrics of the last collection" cell to a value computed on demand from
//! the single process-wide collector.

/// A point-in-time snapshot of the collector's state, returned by
/// `debug_stats` in addition to the printed report it emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    /// Live (non-empty) pages across every size class.
    pub live_pages: usize,
    /// Cached empty pages available for repurposing.
    pub empty_pages: usize,
    /// Bytes live as of the last completed collection.
    pub last_live_bytes: usize,
    /// Bytes allocated since the last collection.
    pub bytes_since_last_gc: usize,
    /// Number of full collections run so far.
    pub total_collections: usize,
}

impl GcStats {
    /// Print a report of page counts and live byte totals.
    pub fn print(&self) {
        eprintln!(
            "[bibop-gc] live_pages={} empty_pages={} last_live_bytes={} \
             bytes_since_last_gc={} total_collections={}",
            self.live_pages,
            self.empty_pages,
            self.last_live_bytes,
            self.bytes_since_last_gc,
            self.total_collections
        );
    }
}
