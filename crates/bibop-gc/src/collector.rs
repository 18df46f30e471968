//! The collector: owns every subsystem and runs the stop-the-world
//! mark/sweep cycle.
//!
//! There is no single teacher counterpart for this module — `rudo-gc` splits
//! the same responsibilities across `gc/incremental.rs`, `gc/marker.rs`, and
//! `gc/worklist.rs` for a generational, incrementally-traced collector. This
//! bundles region, book, page index, roots, pressure controller, and
//! worklist into one struct (`GlobalHeap`'s role in `rudo-gc/src/heap.rs`),
//! since there is exactly one process-wide collector instance here with no
//! generations or incremental steps to coordinate between.

use std::ptr::NonNull;

use crate::book::Book;
use crate::config::GcConfig;
use crate::diagnostics::{self, GcPhase};
use crate::error::GcError;
use crate::index::PageIndex;
use crate::metrics::GcStats;
use crate::page::{Page, PAGE_SIZE};
use crate::pressure::PressureController;
use crate::region::Region;
use crate::roots::RootRegistry;
use crate::size_class::{slot_size, NUM_CLASSES};
use crate::stack;

/// The single process-wide collector instance.
pub struct Collector {
    pub(crate) region: Region,
    pub(crate) book: Book,
    pub(crate) index: PageIndex<NonNull<Page>>,
    pub(crate) roots: RootRegistry,
    pub(crate) pressure: PressureController,
    pub(crate) worklist: Vec<(NonNull<Page>, usize)>,
    pub(crate) stack_top_hint: usize,
    pub(crate) free_empty_pages: bool,
    total_collections: usize,
}

impl Collector {
    /// Bring up a fresh collector from a full [`GcConfig`]. Fails only if
    /// `stack_top_hint` is null, the one address the client is required to
    /// supply.
    pub fn with_config(config: GcConfig) -> Result<Self, GcError> {
        if config.stack_top_hint == 0 {
            return Err(GcError::NullStackTopHint);
        }
        Ok(Self {
            region: Region::init(),
            book: Book::new(),
            index: PageIndex::with_capacity(config.initial_index_capacity),
            roots: RootRegistry::new(),
            pressure: PressureController::new(config.growth_factor),
            worklist: Vec::with_capacity(config.initial_worklist_capacity),
            stack_top_hint: config.stack_top_hint,
            free_empty_pages: config.free_empty_pages,
            total_collections: 0,
        })
    }

    /// Convenience entry point over [`Self::with_config`] for the common case
    /// of only needing the two parameters the top-level `init` takes directly.
    pub fn new(stack_top_hint: usize, free_empty_pages: bool) -> Result<Self, GcError> {
        Self::with_config(GcConfig {
            stack_top_hint,
            free_empty_pages,
            ..GcConfig::default()
        })
    }

    /// Register `addr` as a root.
    pub fn root(&mut self, addr: usize) {
        self.roots.root(addr);
    }

    /// Deregister `addr`; logs a soft diagnostic if it was never registered.
    pub fn unroot(&mut self, addr: usize) {
        if !self.roots.unroot(addr) {
            diagnostics::log_unroot_not_found(addr);
        }
    }

    /// Force a full collection cycle.
    pub fn collect(&mut self) {
        self.collect_inner(true);
    }

    /// Run a cycle, distinguishing a client-requested collection from one
    /// triggered by the pressure controller, for diagnostics only — both
    /// follow the identical clear/mark/sweep pipeline.
    pub(crate) fn collect_inner(&mut self, forced: bool) {
        let gc_id = diagnostics::next_gc_id();
        let _span = diagnostics::trace_collection(gc_id, forced);

        diagnostics::log_phase_start(GcPhase::Clear, 0);
        #[cfg(debug_assertions)]
        self.debug_assert_marks_clear();
        diagnostics::log_phase_end(GcPhase::Clear, 0);

        diagnostics::log_phase_start(GcPhase::Mark, self.pressure.last_live_bytes);
        self.mark();
        diagnostics::log_phase_end(GcPhase::Mark, 0);

        diagnostics::log_phase_start(GcPhase::Sweep, self.pressure.bytes_since_last_gc);
        let live_bytes = self.sweep();
        diagnostics::log_phase_end(GcPhase::Sweep, live_bytes);

        self.pressure.record_collection(live_bytes);
        self.total_collections += 1;
    }

    /// Stack scan, root scan, and worklist trace.
    fn mark(&mut self) {
        let stack_top_hint = self.stack_top_hint;
        // SAFETY: `stack_top_hint` was validated non-null at `Collector::new`
        // and is required by the client contract to bound every frame
        // reachable at a collection point.
        unsafe {
            stack::scan_current_stack(stack_top_hint, |word| self.mark_ptr(word));
        }

        // Copy root values out before tracing: `mark_ptr` needs `&mut self`
        // as a whole, which would otherwise overlap the borrow of `self.roots`
        // that `iter_values` holds.
        let root_values: Vec<usize> = unsafe { self.roots.iter_values().collect() };
        for v in root_values {
            self.mark_ptr(v);
        }

        self.trace_worklist();
    }

    /// Attempt to mark the slot interior pointer `p` falls within.
    fn mark_ptr(&mut self, p: usize) {
        if p == 0 {
            return;
        }
        let Some(&page_ptr) = self.index.lookup_by_interior_pointer(p, PAGE_SIZE) else {
            return;
        };
        // SAFETY: every pointer stored in the index is owned by a `Box<Page>`
        // held in `self.book` for as long as the index entry exists.
        let page = unsafe { &mut *page_ptr.as_ptr() };

        let off = p - page.block.as_ptr() as usize;
        if off >= PAGE_SIZE {
            return;
        }
        let idx = off / slot_size(page.size_class);
        if idx >= page.nslots {
            return;
        }
        if !page.is_inuse(idx) {
            return;
        }
        if !page.is_marked(idx) {
            page.set_marked(idx);
            self.worklist.push((page_ptr, idx));
        }
    }

    /// Drain the worklist, treating each marked slot's payload as an array
    /// of machine words.
    fn trace_worklist(&mut self) {
        while let Some((page_ptr, idx)) = self.worklist.pop() {
            // SAFETY: see `mark_ptr`; the page outlives this worklist entry.
            let words: Vec<usize> = unsafe { (*page_ptr.as_ptr()).slot_words(idx).to_vec() };
            for w in words {
                self.mark_ptr(w);
            }
        }
    }

    /// Reclaim unmarked slots, clear surviving mark bits, and retire
    /// emptied pages. Returns the new `last_live_bytes`.
    fn sweep(&mut self) -> usize {
        let mut live_bytes = 0usize;

        for sc in 0..NUM_CLASSES {
            let mut i = 0;
            loop {
                let len = self.book.class_list(sc).len();
                if i >= len {
                    break;
                }

                let (emptied, base, inuse_count, size_class) = {
                    let pages = self.book.class_list(sc);
                    let page = &mut pages[i];
                    for idx in 0..page.nslots {
                        if page.is_inuse(idx) && !page.is_marked(idx) {
                            page.set_inuse(idx, false);
                            page.inuse_count -= 1;
                            page.push_free_slot(idx);
                        } else if page.is_marked(idx) {
                            page.clear_marked(idx);
                        }
                    }
                    (
                        page.inuse_count == 0,
                        page.block.as_ptr() as usize,
                        page.inuse_count,
                        page.size_class,
                    )
                };

                if emptied {
                    if self.free_empty_pages {
                        // Dedicated mapping: destroy outright. A cache-mode
                        // page instead keeps its index entry while it sits on
                        // the empty list, since the block alignment and
                        // index entry are still correct once it's reset for
                        // a different class.
                        self.index.remove(base);
                        let _page = self.book.take_from_class(sc, i);
                    } else {
                        self.book.move_to_empty(sc, i);
                    }
                    // `take_from_class`/`move_to_empty` swap_remove, so the
                    // element now at `i` is unvisited; don't advance.
                } else {
                    live_bytes += inuse_count * slot_size(size_class);
                    i += 1;
                }
            }
        }

        live_bytes
    }

    #[cfg(debug_assertions)]
    fn debug_assert_marks_clear(&mut self) {
        for (_, pages) in self.book.classes_mut() {
            for page in pages.iter() {
                for idx in 0..page.nslots {
                    debug_assert!(!page.is_marked(idx), "mark bit left set across collections");
                }
            }
        }
    }

    /// A point-in-time snapshot for `debug_stats`.
    #[must_use]
    pub fn stats(&mut self) -> GcStats {
        GcStats {
            live_pages: self.book.live_page_count(),
            empty_pages: self.book.empty_page_count(),
            last_live_bytes: self.pressure.last_live_bytes,
            bytes_since_last_gc: self.pressure.bytes_since_last_gc,
            total_collections: self.total_collections,
        }
    }
}
