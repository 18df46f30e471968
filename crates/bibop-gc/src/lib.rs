//! `bibop-gc`: a conservative, non-moving, mark-and-sweep garbage collector
//! layered over a `BiBOP` (Big Bag of Pages) region allocator.
//!
//! The collector has no source-level type information about the objects it
//! manages: reachability is determined **conservatively** by scanning the
//! machine stack and an explicit root registry, treating any machine word
//! that points into a managed slot as a live reference. This makes it
//! suitable for embedding in a manually-managed host language that wants
//! automatic reclamation without a type system to drive precise marking.
//!
//! # Quick start
//!
//! ```ignore
//! use bibop_gc as gc;
//!
//! fn main() {
//!     let stack_top: usize = 0;
//!     gc::init(std::ptr::addr_of!(stack_top) as usize, true).unwrap();
//!
//!     let mut p: *mut u8 = gc::alloc(24).as_ptr();
//!     unsafe { gc::root(std::ptr::addr_of_mut!(p)) };
//!
//!     unsafe { std::ptr::copy_nonoverlapping(b"HELLO".as_ptr(), p, 5) };
//!     gc::collect();
//!     assert_eq!(unsafe { std::slice::from_raw_parts(p, 5) }, b"HELLO");
//!
//!     unsafe { gc::unroot(std::ptr::addr_of_mut!(p)) };
//!     gc::destroy();
//! }
//! ```
//!
//! # Safety contract
//!
//! Because marking is conservative, every managed pointer the client cares
//! about must be reachable from either the scanned stack region or the root
//! registry at every [`collect`] point. A pointer stashed only in a
//! heap-allocated client structure, thread-local storage, or a global is
//! invisible to the stack scan and **must** be rooted with [`root`] or it
//! will be reclaimed out from under the client.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

mod alloc;
mod book;
mod collector;
mod config;
mod diagnostics;
mod error;
mod index;
mod metrics;
mod page;
mod pressure;
mod region;
mod roots;
mod size_class;
mod stack;

use std::ptr::NonNull;
use std::sync::OnceLock;

use parking_lot::Mutex;

use collector::Collector;

pub use config::GcConfig;
pub use error::GcError;
pub use metrics::GcStats;
pub use page::PAGE_SIZE;
pub use region::Region;
pub use size_class::{class_of, slot_size, MAX_CLASS_SIZE, NUM_CLASSES, SIZE_CLASSES};

// `Collector` holds raw `NonNull<Page>` pointers rather than an `Arc`/`Rc`
// reference-counted graph, so it doesn't derive `Send`/`Sync` automatically.
// The collector is only ever accessed through `COLLECTOR`'s mutex, and this
// is a single-threaded, stop-the-world design with no concurrent mutator or
// collector thread; client code running the mutator across multiple OS
// threads is still responsible for picking one thread to call into this
// crate at a time, but whichever thread calls in must be able to acquire
// the lock.
unsafe impl Send for Collector {}

/// The process-wide collector singleton. `None` before [`init`] and after
/// [`destroy`].
static COLLECTOR: OnceLock<Mutex<Option<Collector>>> = OnceLock::new();

fn cell() -> &'static Mutex<Option<Collector>> {
    COLLECTOR.get_or_init(|| Mutex::new(None))
}

fn with_collector<R>(f: impl FnOnce(&mut Collector) -> R) -> R {
    let mut guard = cell().lock();
    let gc = guard
        .as_mut()
        .expect("bibop_gc::init must be called before using the collector");
    f(gc)
}

/// Initialize the collector singleton from a full [`GcConfig`].
///
/// # Errors
///
/// Returns [`GcError::AlreadyInitialized`] if the singleton is already live
/// (call [`destroy`] first), or [`GcError::NullStackTopHint`] if
/// `config.stack_top_hint` is the null address.
pub fn init_with_config(config: GcConfig) -> Result<(), GcError> {
    let mut guard = cell().lock();
    if guard.is_some() {
        return Err(GcError::AlreadyInitialized);
    }
    *guard = Some(Collector::with_config(config)?);
    Ok(())
}

/// Initialize the collector singleton.
///
/// `stack_top_hint` must be the address of a variable living at or above the
/// deepest frame from which allocation will ever occur (typically taken in
/// `main`); see the module-level safety contract. `free_empty_pages` toggles
/// between caching emptied pages for reuse (`false`) and returning them to
/// the system immediately (`true`).
///
/// # Errors
///
/// See [`init_with_config`].
pub fn init(stack_top_hint: usize, free_empty_pages: bool) -> Result<(), GcError> {
    init_with_config(GcConfig {
        stack_top_hint,
        free_empty_pages,
        ..GcConfig::default()
    })
}

/// Tear down the collector singleton, releasing the region store, all page
/// metadata and bitmaps, the root registry, the worklist, and the page
/// index. Idempotent: calling `destroy` when the singleton is not live is a
/// no-op.
pub fn destroy() {
    let mut guard = cell().lock();
    *guard = None;
}

/// Return a pointer to `n` writable bytes.
///
/// Zero-initialized on first use of a slot; the contents of a reused slot
/// (one previously swept and returned to a free list) are unspecified.
/// May trigger a collection under pressure. Requests larger than
/// [`MAX_CLASS_SIZE`] are served directly from the region store and are
/// never traced by the collector — they persist until [`destroy`].
///
/// Never returns a null pointer: a second consecutive allocation failure
/// after a forced collection terminates the process.
///
/// # Panics
///
/// Panics if called before [`init`].
#[must_use]
pub fn alloc(n: usize) -> NonNull<u8> {
    with_collector(|gc| gc.alloc(n))
}

/// Force a full mark-and-sweep collection cycle.
///
/// # Panics
///
/// Panics if called before [`init`].
pub fn collect() {
    with_collector(Collector::collect);
}

/// Register the address of a client pointer variable as a GC root.
///
/// `slot` is the address of a pointer-sized variable, not the pointer value
/// itself — mirroring the C macro this crate's behavior is grounded in
/// (`GC_MARK(var)` expands to `gcRootVariable((void**)&(var))`). The
/// collector re-reads `*slot` on every collection, so reassigning the
/// variable to a different managed pointer keeps it correctly rooted. A
/// null `slot` is a no-op; re-rooting an already-rooted address is
/// idempotent.
///
/// # Safety
///
/// `slot` must be valid for reads for as long as it remains rooted (i.e.
/// until a matching [`unroot`] or [`destroy`]), and must always hold either
/// a null pointer or a pointer previously returned by [`alloc`].
///
/// # Panics
///
/// Panics if called before [`init`].
pub unsafe fn root<T>(slot: *mut *mut T) {
    with_collector(|gc| gc.root(slot as usize));
}

/// Deregister a client pointer variable previously rooted with [`root`].
///
/// A null `slot` is a no-op. If `slot` was never rooted (or was already
/// unrooted), this logs a soft diagnostic and otherwise does nothing.
///
/// # Panics
///
/// Panics if called before [`init`].
pub unsafe fn unroot<T>(slot: *mut *mut T) {
    with_collector(|gc| gc.unroot(slot as usize));
}

/// Print a report of page counts and live byte totals, and return the same
/// data as a queryable [`GcStats`] snapshot.
///
/// # Panics
///
/// Panics if called before [`init`].
pub fn debug_stats() -> GcStats {
    let stats = with_collector(Collector::stats);
    stats.print();
    stats
}

#[doc(hidden)]
pub mod test_util {
    //! Test-only helpers for exercising collector internals without going
    //! through the process-wide singleton.
    pub use crate::collector::Collector;
    pub use crate::config::GcConfig;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // The process-wide singleton means init/destroy tests must not run
    // concurrently with each other or with `debug_stats`/`alloc` tests
    // elsewhere in the crate; serialize them behind a dedicated lock.
    static SINGLETON_TEST_LOCK: StdMutex<()> = StdMutex::new(());

    fn stack_hint() -> usize {
        let local = 0usize;
        std::ptr::addr_of!(local) as usize
    }

    #[test]
    fn init_then_destroy_then_reinit_succeeds() {
        let _guard = SINGLETON_TEST_LOCK.lock().unwrap();
        destroy();
        init(stack_hint(), true).unwrap();
        destroy();
        init(stack_hint(), true).unwrap();
        destroy();
    }

    #[test]
    fn double_init_reports_already_initialized() {
        let _guard = SINGLETON_TEST_LOCK.lock().unwrap();
        destroy();
        init(stack_hint(), true).unwrap();
        assert!(matches!(
            init(stack_hint(), true),
            Err(GcError::AlreadyInitialized)
        ));
        destroy();
    }

    #[test]
    fn destroy_before_init_is_a_no_op() {
        let _guard = SINGLETON_TEST_LOCK.lock().unwrap();
        destroy();
        destroy();
    }

    #[test]
    fn init_rejects_null_stack_top_hint() {
        let _guard = SINGLETON_TEST_LOCK.lock().unwrap();
        destroy();
        assert!(matches!(init(0, true), Err(GcError::NullStackTopHint)));
    }

    #[test]
    fn end_to_end_rooted_pointer_survives_collect() {
        let _guard = SINGLETON_TEST_LOCK.lock().unwrap();
        destroy();
        init(stack_hint(), true).unwrap();

        let mut p: *mut u8 = alloc(24).as_ptr();
        unsafe {
            root(std::ptr::addr_of_mut!(p));
            std::ptr::copy_nonoverlapping(b"HELLO".as_ptr(), p, 5);
        }
        collect();
        let bytes = unsafe { std::slice::from_raw_parts(p, 5) };
        assert_eq!(bytes, b"HELLO");
        unsafe { unroot(std::ptr::addr_of_mut!(p)) };
        destroy();
    }

    #[test]
    fn debug_stats_reflects_allocations() {
        let _guard = SINGLETON_TEST_LOCK.lock().unwrap();
        destroy();
        init(stack_hint(), false).unwrap();
        let mut p: *mut u8 = alloc(64).as_ptr();
        unsafe { root(std::ptr::addr_of_mut!(p)) };
        collect();
        let stats = debug_stats();
        assert!(stats.last_live_bytes > 0);
        unsafe { unroot(std::ptr::addr_of_mut!(p)) };
        destroy();
    }
}
