//! Interior-pointer tolerance tests: a pointer into the middle of a slot
//! must still resolve to, mark, and keep alive the slot it falls within.

use bibop_gc::test_util::Collector;

fn stack_hint() -> usize {
    let local = 0usize;
    std::ptr::addr_of!(local) as usize
}

#[test]
fn rooted_interior_pointer_keeps_its_slot_alive() {
    let mut gc = Collector::new(stack_hint(), true).unwrap();

    let base = gc.alloc(64);
    unsafe {
        std::ptr::write_bytes(base.as_ptr(), 0, 64);
        std::ptr::copy_nonoverlapping(b"payload-marker!!".as_ptr(), base.as_ptr(), 16);
    }

    // Root a pointer that has drifted 20 bytes past the slot base -- still
    // well within the 64-byte slot.
    let mut interior: *mut u8 = unsafe { base.as_ptr().add(20) };
    gc.root(std::ptr::addr_of_mut!(interior) as usize);

    gc.collect();
    gc.collect();

    let bytes = unsafe { std::slice::from_raw_parts(base.as_ptr(), 16) };
    assert_eq!(bytes, b"payload-marker!!");

    gc.unroot(std::ptr::addr_of_mut!(interior) as usize);
}

#[test]
fn interior_pointer_at_the_very_last_byte_of_a_slot_still_resolves() {
    let mut gc = Collector::new(stack_hint(), false).unwrap();

    let base = gc.alloc(32);
    let mut interior: *mut u8 = unsafe { base.as_ptr().add(31) };
    gc.root(std::ptr::addr_of_mut!(interior) as usize);

    gc.collect();
    let stats = gc.stats();
    assert!(stats.last_live_bytes >= 32);

    gc.unroot(std::ptr::addr_of_mut!(interior) as usize);
}

#[test]
fn dropping_the_only_interior_reference_allows_reclamation() {
    let mut gc = Collector::new(stack_hint(), true).unwrap();

    {
        let base = gc.alloc(64);
        let _interior: *mut u8 = unsafe { base.as_ptr().add(10) };
        // Neither `base` nor `_interior` is rooted, and both go out of
        // scope before the next collection -- the conservative stack scan
        // for *this* frame won't see them once this block's locals are
        // popped from the scan range on the next call.
    }

    for _ in 0..64 {
        let _ = gc.alloc(64);
    }
    gc.collect();
    // Can't assert zero live bytes deterministically (the scan range may
    // still straddle stale stack slots containing the old value), but the
    // cycle must complete without touching freed memory incorrectly.
    let _ = gc.stats();
}
