//! Collector configuration.
//!
//! Grounded in `rudo-gc/src/gc/incremental.rs`'s `IncrementalConfig`: a
//! plain `Copy` struct with a `Default` impl, passed once at setup rather
//! than threaded through every call site. This crate has no incremental
//! mode, but its tunables (`growth_factor`, initial capacities) deserve the
//! same treatment instead of being hardcoded constants.

use crate::pressure::DEFAULT_GROWTH_FACTOR;

/// Initial page-index capacity.
pub const DEFAULT_INDEX_CAPACITY: usize = 128;
/// Initial worklist capacity.
pub const DEFAULT_WORKLIST_CAPACITY: usize = 128;

/// Tunables accepted by `init`.
///
/// `stack_top_hint` has no sensible default; build a `GcConfig` with
/// `..GcConfig::default()` and set it explicitly, or use the plain
/// `init(stack_top_hint, free_empty_pages)` convenience entry point.
#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    /// Address at or above the deepest stack frame from which allocation
    /// will ever occur.
    pub stack_top_hint: usize,
    /// `true` to source pages from a dedicated, individually-freeable
    /// system mapping; `false` to source them from the region store and
    /// cache emptied pages indefinitely.
    pub free_empty_pages: bool,
    /// Multiplier applied to the live-byte baseline to get the pressure
    /// threshold. Default `1.5`.
    pub growth_factor: f64,
    /// Initial page-index capacity. Default `128`.
    pub initial_index_capacity: usize,
    /// Initial worklist capacity. Default `128`.
    pub initial_worklist_capacity: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            stack_top_hint: 0,
            free_empty_pages: false,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            initial_index_capacity: DEFAULT_INDEX_CAPACITY,
            initial_worklist_capacity: DEFAULT_WORKLIST_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_module_constants() {
        let config = GcConfig::default();
        assert_eq!(config.growth_factor, DEFAULT_GROWTH_FACTOR);
        assert_eq!(config.initial_index_capacity, DEFAULT_INDEX_CAPACITY);
        assert_eq!(config.initial_worklist_capacity, DEFAULT_WORKLIST_CAPACITY);
        assert_eq!(config.stack_top_hint, 0);
    }
}
