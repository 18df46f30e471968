//! Region backing store.
//!
//! A linked list of large, fixed-size buffers carved up by bump allocation.
//! It never returns memory to the OS before `Region::destroy` (here, before
//! the `Region` value is dropped).
//!
//! Grounded in the `MemBlock`/`Arena` linked list of `original_source/arena/arena.c`,
//! with the page-aligned path (`region_alloc_aligned_page`) served by `sys_alloc`'s
//! anonymous mmap rather than a manually-aligned `malloc`, since that is the
//! idiomatic way the pack sources page-aligned memory on real OSes.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::page::PAGE_SIZE;

/// Size of each backing buffer carved up by bump allocation (1 MiB, matching
/// `original_source/arena/arena.h`'s `BUFF_SIZE`).
const BLOCK_SIZE: usize = 1024 * 1024;

struct Block {
    buffer: Vec<u8>,
    head: usize,
}

impl Block {
    /// Reserve `size` zeroed bytes without aborting on allocation failure,
    /// so the allocator front end can collect and retry instead of the
    /// process dying on the first OOM.
    fn try_new(size: usize) -> Option<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).ok()?;
        buffer.resize(size, 0);
        Some(Self { buffer, head: 0 })
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.head
    }
}

/// A growing chain of buffers from which page storage and oversize
/// allocations are carved.
pub struct Region {
    blocks: Vec<Block>,
}

impl Region {
    /// `region_init`: create an empty region with one initial block.
    #[must_use]
    pub fn init() -> Self {
        Self {
            blocks: vec![Block::try_new(BLOCK_SIZE).expect("initial region block")],
        }
    }

    /// `region_alloc`: return a pointer to `n` zeroed, word-aligned bytes, or
    /// `None` on allocation failure, so the caller can force a collection
    /// and retry once before giving up.
    ///
    /// Large requests (bigger than `BLOCK_SIZE`) get a dedicated block sized
    /// exactly to the request, matching `arenaAlloc`'s big-chunk path.
    pub fn try_alloc(&mut self, n: usize) -> Option<NonNull<u8>> {
        let align = std::mem::align_of::<usize>();

        if n > BLOCK_SIZE {
            let mut block = Block::try_new(n + align)?;
            let ptr = Self::bump(&mut block, n, align);
            self.blocks.push(block);
            return Some(ptr);
        }

        if let Some(last) = self.blocks.last_mut() {
            if Self::fits(last, n, align) {
                return Some(Self::bump(last, n, align));
            }
        }

        let block = Block::try_new(BLOCK_SIZE)?;
        self.blocks.push(block);
        let last = self.blocks.last_mut().expect("just pushed");
        Some(Self::bump(last, n, align))
    }

    /// Infallible convenience wrapper over [`Self::try_alloc`] for call
    /// sites (tests, oversize fast paths already behind a retry loop) that
    /// don't need to distinguish failure from the collect-and-retry policy.
    pub fn alloc(&mut self, n: usize) -> NonNull<u8> {
        self.try_alloc(n)
            .unwrap_or_else(|| handle_region_oom(n.max(BLOCK_SIZE)))
    }

    /// `region_alloc_aligned_page`: a `PAGE_SIZE`-aligned 1 MiB buffer, sourced
    /// from its own dedicated block so later bump allocations in the region
    /// are unaffected by page-sized gaps. `None` on allocation failure.
    pub fn try_alloc_aligned_page(&mut self) -> Option<NonNull<u8>> {
        // Over-allocate so we can hand back an aligned sub-slice; the
        // system mapper only guarantees page-granularity alignment.
        let mut block = Block::try_new(PAGE_SIZE * 2)?;
        let base = block.buffer.as_ptr() as usize;
        let aligned = (base + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        block.head = aligned - base;
        let ptr = unsafe { block.buffer.as_mut_ptr().add(block.head) };
        block.head += PAGE_SIZE;
        self.blocks.push(block);
        Some(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Infallible convenience wrapper over [`Self::try_alloc_aligned_page`].
    pub fn alloc_aligned_page(&mut self) -> NonNull<u8> {
        self.try_alloc_aligned_page()
            .unwrap_or_else(|| handle_region_oom(PAGE_SIZE * 2))
    }

    fn fits(block: &Block, n: usize, align: usize) -> bool {
        let base = unsafe { block.buffer.as_ptr().add(block.head) } as usize;
        let pad = Self::padding(base, align);
        block.remaining() >= n + pad
    }

    fn bump(block: &mut Block, n: usize, align: usize) -> NonNull<u8> {
        let base = unsafe { block.buffer.as_ptr().add(block.head) } as usize;
        let pad = Self::padding(base, align);
        let ptr = unsafe { block.buffer.as_mut_ptr().add(block.head + pad) };
        block.head += pad + n;
        unsafe { NonNull::new_unchecked(ptr) }
    }

    const fn padding(base: usize, align: usize) -> usize {
        let mis = base % align;
        if mis == 0 {
            0
        } else {
            align - mis
        }
    }
}

/// The fatal path for an infallible allocation wrapper: diagnose and abort,
/// matching the teacher's use of `std::alloc::handle_alloc_error` for
/// unrecoverable metadata allocation failures.
fn handle_region_oom(size: usize) -> ! {
    let layout = Layout::from_size_align(size, std::mem::align_of::<usize>())
        .unwrap_or_else(|_| Layout::new::<u8>());
    std::alloc::handle_alloc_error(layout)
}

// `region_destroy` is `Region`'s `Drop` impl (the default one, since `Vec<Block>`
// frees its buffers on drop) — there is nothing to add over what Rust already does.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_word_aligned() {
        let mut region = Region::init();
        let ptr = region.alloc(64);
        let align = std::mem::align_of::<usize>();
        assert_eq!(ptr.as_ptr() as usize % align, 0);
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn oversize_request_gets_dedicated_block() {
        let mut region = Region::init();
        let ptr = region.alloc(BLOCK_SIZE + 4096);
        assert!(!ptr.as_ptr().is_null());
        assert_eq!(region.blocks.len(), 2);
    }

    #[test]
    fn aligned_page_is_page_size_aligned() {
        let mut region = Region::init();
        let ptr = region.alloc_aligned_page();
        assert_eq!(ptr.as_ptr() as usize % PAGE_SIZE, 0);
    }

    #[test]
    fn many_small_allocs_reuse_the_current_block() {
        let mut region = Region::init();
        for _ in 0..1000 {
            region.alloc(64);
        }
        assert_eq!(region.blocks.len(), 1);
    }
}
