//! Fixed size-class table for `BiBOP` slot routing.
//!
//! Objects are routed to the smallest size class that fits them. A request
//! larger than the biggest class is oversize and bypasses the page system
//! entirely (see `crate::alloc`).

use crate::page::PAGE_SIZE;

/// Ascending slot sizes, in bytes, from 16 B to 256 KiB.
pub const SIZE_CLASSES: [usize; 15] = [
    16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536, 131_072, 262_144,
];

/// Number of size classes.
pub const NUM_CLASSES: usize = SIZE_CLASSES.len();

/// Largest size still served by the page system; anything bigger is oversize.
pub const MAX_CLASS_SIZE: usize = SIZE_CLASSES[NUM_CLASSES - 1];

/// A size-class index, or `None` when the request is oversize.
pub type SizeClass = usize;

/// Bytes per slot for size class `sc`.
#[must_use]
pub const fn slot_size(sc: SizeClass) -> usize {
    SIZE_CLASSES[sc]
}

/// Number of slots a page of size class `sc` is partitioned into.
#[must_use]
pub const fn slots_per_page(sc: SizeClass) -> usize {
    PAGE_SIZE / slot_size(sc)
}

/// The smallest size class whose slot size is `>= size`, or `None` if `size`
/// exceeds every class (an oversize request).
#[must_use]
pub fn class_of(size: usize) -> Option<SizeClass> {
    SIZE_CLASSES.iter().position(|&s| s >= size)
}
