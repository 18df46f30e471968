//! Pressure controller: decides when to auto-collect.
//!
//! There is no teacher counterpart (`rudo-gc`'s `default_collect_condition`
//! triggers on drop-count vs. live-count, not byte pressure against a
//! growth factor) — this is new code following the classic generational-GC
//! formula of comparing bytes allocated since the last cycle against the
//! previous live set scaled by a growth factor, written in the style of the
//! teacher's small, `Copy` condition structs (`gc::incremental::
//! IncrementalConfig`).

use crate::page::PAGE_SIZE;

/// Default growth factor applied to the live-byte baseline.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// Tracks bytes allocated since the last cycle and decides when that
/// crosses the pressure threshold relative to the last live-byte baseline.
pub struct PressureController {
    /// Bytes allocated since the last full collection.
    pub bytes_since_last_gc: usize,
    /// Bytes live as of the end of the last collection.
    pub last_live_bytes: usize,
    /// Multiplier applied to the live-byte baseline to get the threshold.
    pub growth_factor: f64,
}

impl PressureController {
    /// A fresh controller with no live bytes recorded yet.
    #[must_use]
    pub const fn new(growth_factor: f64) -> Self {
        Self {
            bytes_since_last_gc: 0,
            last_live_bytes: 0,
            growth_factor,
        }
    }

    /// Would allocating `n` more bytes cross the pressure threshold? The
    /// baseline is the live-byte count as of the last collection, or one
    /// page's worth before any collection has run; the threshold is that
    /// baseline scaled by the growth factor.
    #[must_use]
    pub fn should_collect(&self, n: usize) -> bool {
        let baseline = if self.last_live_bytes == 0 {
            PAGE_SIZE
        } else {
            self.last_live_bytes
        };
        #[allow(clippy::cast_precision_loss)]
        let threshold = baseline as f64 * self.growth_factor;
        #[allow(clippy::cast_precision_loss)]
        let projected = (self.bytes_since_last_gc + n) as f64;
        projected > threshold
    }

    /// Record bytes allocated outside of a collection (including oversize
    /// allocations, which still count toward pressure even though they are
    /// never traced).
    pub fn record_alloc(&mut self, n: usize) {
        self.bytes_since_last_gc += n;
    }

    /// Reset after a collection completes, recording the new live-byte
    /// baseline.
    pub fn record_collection(&mut self, live_bytes: usize) {
        self.last_live_bytes = live_bytes;
        self.bytes_since_last_gc = 0;
    }
}
