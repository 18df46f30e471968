//! A single `BiBOP` page: a fixed-size, naturally-aligned block partitioned
//! into equal-sized slots of one size class, plus per-slot bitmaps and an
//! intrusive free list.
//!
//! Layout and bitmap handling are grounded in `rudo-gc/src/heap.rs`'s
//! `PageHeader` (mark/allocated bitmaps, `header_size`/`max_objects`
//! arithmetic); the free-list encoding (next-free index stored in the slot's
//! own payload) is grounded in `rudo-gc/src/heap.rs::Segment::allocate`'s
//! free-list read/write, generalized from a compile-time `BLOCK_SIZE` to a
//! runtime size class.

use std::ptr::NonNull;

use sys_alloc::MmapOptions;

use crate::region::Region;
use crate::size_class::{slot_size, slots_per_page, SizeClass};

/// Size of a page: 1 MiB, naturally aligned.
pub const PAGE_SIZE: usize = 1024 * 1024;

/// Sentinel marking an empty free list.
pub const FREE_LIST_NIL: i32 = -1;

/// How a page's backing memory was sourced, so `Page::destroy` knows whether
/// it can individually release the block.
enum Backing {
    /// Carved from the region store; never individually freed (cache mode).
    Region,
    /// A dedicated aligned system mapping; freed on drop (free mode).
    SysAlloc(sys_alloc::Mmap),
}

/// A 1 MiB, naturally-aligned page of slots of one size class.
pub struct Page {
    /// Base address of the page; always `PAGE_SIZE`-aligned.
    pub block: NonNull<u8>,
    backing: Backing,
    /// Current size class.
    pub size_class: SizeClass,
    /// Total slots in this page, derived from `size_class`.
    pub nslots: usize,
    /// Number of currently allocated slots.
    pub inuse_count: usize,
    /// Head of the intrusive free list, or `FREE_LIST_NIL`.
    pub free_head: i32,
    inuse_bits: Vec<u8>,
    mark_bits: Vec<u8>,
}

fn bitmap_bytes(nslots: usize) -> usize {
    nslots.div_ceil(8)
}

impl Page {
    /// Build a fresh page of size class `sc`, sourcing its block from
    /// `region` (cache mode) or from a dedicated aligned mapping (free mode).
    /// `None` on allocation failure, so the allocator front end can implement
    /// its own collect-and-retry policy.
    pub fn try_new(sc: SizeClass, region: Option<&mut Region>, free_empty_pages: bool) -> Option<Self> {
        let (block, backing) = if free_empty_pages {
            Self::try_alloc_aligned_mapping()?
        } else {
            let region = region.expect("cache mode requires a region handle");
            (region.try_alloc_aligned_page()?, Backing::Region)
        };
        // Freshly carved memory from both paths is zeroed: `Region` allocates
        // zeroed `Vec<u8>` storage, and anonymous mmap pages are zero-filled
        // by the kernel.
        let mut page = Self::blank(block, backing, sc);
        page.init_free_list();
        Some(page)
    }

    /// Infallible convenience wrapper over [`Self::try_new`], for call sites
    /// that don't implement their own retry (tests, and the front end's own
    /// collect-and-retry loop once it has already retried once).
    pub fn new(sc: SizeClass, region: Option<&mut Region>, free_empty_pages: bool) -> Self {
        Self::try_new(sc, region, free_empty_pages).expect("page allocation failed")
    }

    /// Re-seat an existing (empty) page for a new size class, skipping block
    /// acquisition.
    pub fn reset_for_class(&mut self, sc: SizeClass) {
        debug_assert_eq!(self.inuse_count, 0);
        self.size_class = sc;
        self.nslots = slots_per_page(sc);
        self.inuse_bits = vec![0u8; bitmap_bytes(self.nslots)];
        self.mark_bits = vec![0u8; bitmap_bytes(self.nslots)];
        // Zero the slots so the next allocation observes a clean free list.
        unsafe {
            std::ptr::write_bytes(self.block.as_ptr(), 0, PAGE_SIZE);
        }
        self.init_free_list();
    }

    fn blank(block: NonNull<u8>, backing: Backing, sc: SizeClass) -> Self {
        let nslots = slots_per_page(sc);
        Self {
            block,
            backing,
            size_class: sc,
            nslots,
            inuse_count: 0,
            free_head: FREE_LIST_NIL,
            inuse_bits: vec![0u8; bitmap_bytes(nslots)],
            mark_bits: vec![0u8; bitmap_bytes(nslots)],
        }
    }

    fn try_alloc_aligned_mapping() -> Option<(NonNull<u8>, Backing)> {
        // Over-map by 2x so we can hand back a PAGE_SIZE-aligned sub-pointer;
        // mmap itself only guarantees system page-granularity alignment.
        let mmap = unsafe { MmapOptions::new().len(PAGE_SIZE * 2).map_anon().ok()? };
        let base = mmap.ptr() as usize;
        let aligned = (base + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let ptr = unsafe { mmap.ptr().add(aligned - base) };
        Some((
            unsafe { NonNull::new_unchecked(ptr) },
            Backing::SysAlloc(mmap),
        ))
    }

    /// Build the free list: slot `i` stores `i+1` as its next index, last
    /// slot stores `FREE_LIST_NIL`.
    fn init_free_list(&mut self) {
        let sc_size = slot_size(self.size_class);
        for i in 0..self.nslots {
            let next: i32 = if i + 1 == self.nslots {
                FREE_LIST_NIL
            } else {
                (i + 1) as i32
            };
            unsafe {
                let slot = self.block.as_ptr().add(i * sc_size).cast::<i32>();
                slot.write_unaligned(next);
            }
        }
        self.free_head = 0;
    }

    /// Pop a slot off the free list, mark it in-use, and return its base
    /// pointer. Caller must have already checked `free_head != FREE_LIST_NIL`.
    ///
    /// The free-list link occupies the slot's first `i32` word; a fresh
    /// page never writes anything else into a slot, so leaving that word as
    /// the stale link index would hand the client a "first use" allocation
    /// whose leading bytes aren't actually zero. Clear it here before
    /// returning the slot.
    pub fn pop_free_slot(&mut self) -> NonNull<u8> {
        debug_assert_ne!(self.free_head, FREE_LIST_NIL);
        let idx = self.free_head as usize;
        let sc_size = slot_size(self.size_class);
        let ptr = unsafe { self.block.as_ptr().add(idx * sc_size) };
        let next = unsafe { ptr.cast::<i32>().read_unaligned() };
        self.free_head = next;
        unsafe {
            ptr.cast::<i32>().write_unaligned(0);
        }
        self.set_inuse(idx, true);
        self.inuse_count += 1;
        unsafe { NonNull::new_unchecked(ptr) }
    }

    /// Push slot `idx` back onto the free list (used by sweep).
    pub fn push_free_slot(&mut self, idx: usize) {
        let sc_size = slot_size(self.size_class);
        unsafe {
            let ptr = self.block.as_ptr().add(idx * sc_size);
            ptr.cast::<i32>().write_unaligned(self.free_head);
        }
        self.free_head = idx as i32;
    }

    fn bit(bits: &[u8], idx: usize) -> bool {
        bits[idx / 8] & (1 << (idx % 8)) != 0
    }

    fn set_bit(bits: &mut [u8], idx: usize, value: bool) {
        if value {
            bits[idx / 8] |= 1 << (idx % 8);
        } else {
            bits[idx / 8] &= !(1 << (idx % 8));
        }
    }

    /// Whether slot `idx` is currently allocated.
    #[must_use]
    pub fn is_inuse(&self, idx: usize) -> bool {
        Self::bit(&self.inuse_bits, idx)
    }

    /// Set or clear the in-use bit for slot `idx`.
    pub fn set_inuse(&mut self, idx: usize, value: bool) {
        Self::set_bit(&mut self.inuse_bits, idx, value);
    }

    /// Whether slot `idx` is currently marked.
    #[must_use]
    pub fn is_marked(&self, idx: usize) -> bool {
        Self::bit(&self.mark_bits, idx)
    }

    /// Set the mark bit for slot `idx`.
    pub fn set_marked(&mut self, idx: usize) {
        Self::set_bit(&mut self.mark_bits, idx, true);
    }

    /// Clear the mark bit for slot `idx`.
    pub fn clear_marked(&mut self, idx: usize) {
        Self::set_bit(&mut self.mark_bits, idx, false);
    }

    /// Number of set bits in `inuse_bits`.
    #[must_use]
    pub fn inuse_popcount(&self) -> usize {
        self.inuse_bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Read the slot at `idx` as an array of machine words, for worklist
    /// tracing.
    #[must_use]
    pub fn slot_words(&self, idx: usize) -> &[usize] {
        let sc_size = slot_size(self.size_class);
        let word_count = sc_size / std::mem::size_of::<usize>();
        unsafe {
            let ptr = self.block.as_ptr().add(idx * sc_size).cast::<usize>();
            std::slice::from_raw_parts(ptr, word_count)
        }
    }

    /// Base pointer of slot `idx`.
    #[must_use]
    pub fn slot_ptr(&self, idx: usize) -> NonNull<u8> {
        let sc_size = slot_size(self.size_class);
        unsafe { NonNull::new_unchecked(self.block.as_ptr().add(idx * sc_size)) }
    }

    /// Whether this page's backing memory can be returned to the system
    /// individually (free mode) as opposed to only being reclaimable at
    /// region teardown (cache mode).
    #[must_use]
    pub fn is_individually_freeable(&self) -> bool {
        matches!(self.backing, Backing::SysAlloc(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    #[test]
    fn fresh_cache_mode_page_has_full_free_list() {
        let mut region = Region::init();
        let page = Page::new(0, Some(&mut region), false);
        assert_eq!(page.inuse_count, 0);
        assert_eq!(page.free_head, 0);
        assert_eq!(page.nslots, slots_per_page(0));
    }

    #[test]
    fn fresh_free_mode_page_is_page_aligned() {
        let page = Page::new(2, None, true);
        assert_eq!(page.block.as_ptr() as usize % PAGE_SIZE, 0);
        assert!(page.is_individually_freeable());
    }

    #[test]
    fn pop_and_push_round_trip_keeps_count_consistent() {
        let mut region = Region::init();
        let mut page = Page::new(0, Some(&mut region), false);
        let ptr = page.pop_free_slot();
        assert_eq!(page.inuse_count, 1);
        assert_eq!(page.inuse_popcount(), 1);
        let idx = (ptr.as_ptr() as usize - page.block.as_ptr() as usize) / slot_size(0);
        page.set_inuse(idx, false);
        page.inuse_count -= 1;
        page.push_free_slot(idx);
        assert_eq!(page.inuse_count, 0);
        assert_eq!(page.inuse_popcount(), 0);
    }

    #[test]
    fn reset_for_class_rebuilds_free_list_for_new_class() {
        let mut page = Page::new(0, None, true);
        page.reset_for_class(3);
        assert_eq!(page.size_class, 3);
        assert_eq!(page.nslots, slots_per_page(3));
        assert_eq!(page.free_head, 0);
    }
}
