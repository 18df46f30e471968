//! Conservative stack scanning.
//!
//! Grounded in `rudo-gc/src/stack.rs`'s register-spill discipline
//! (`spill_registers_and_scan`: an `#[inline(never)]` helper that flushes
//! callee-saved registers to the stack via inline asm, then `black_box`es
//! them so the optimizer can't prove they're dead before the scan reads
//! them back). That module derives its stack *bottom* from
//! `pthread_getattr_np`; here the client instead registers an explicit
//! `stack_top_hint` at `init`, so the bound comes from the collector's own
//! state rather than the OS.

/// Spill callee-saved registers onto the stack, sample the current stack
/// pointer via a sentinel local, and invoke `visit` once per machine word in
/// `[low, high)` where `low`/`high` are the current frame and `stack_top_hint`
/// sorted into ascending order.
///
/// # Safety
///
/// `stack_top_hint` must be an address at or above (numerically, after the
/// swap) the deepest frame active when any allocation can occur, as
/// registered at `init`.
#[inline(never)]
pub unsafe fn scan_current_stack<F>(stack_top_hint: usize, mut visit: F)
where
    F: FnMut(usize),
{
    // Force callee-saved registers that might hold the only remaining
    // reference to a managed object onto the stack before we read it.
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    let mut regs = [0usize; 6];
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        std::arch::asm!(
            "mov {0}, rbx",
            "mov {1}, rbp",
            "mov {2}, r12",
            "mov {3}, r13",
            "mov {4}, r14",
            "mov {5}, r15",
            out(reg) regs[0],
            out(reg) regs[1],
            out(reg) regs[2],
            out(reg) regs[3],
            out(reg) regs[4],
            out(reg) regs[5],
        );
    }
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    std::hint::black_box(&regs);

    #[cfg(any(not(target_arch = "x86_64"), miri))]
    let regs = [0usize; 32];
    #[cfg(any(not(target_arch = "x86_64"), miri))]
    std::hint::black_box(&regs);

    // A stack-allocated sentinel, written immediately before we sample `low`:
    // the write (rather than just taking its address) forces the compiler to
    // materialize this frame on the stack instead of keeping it purely in
    // registers.
    let mut sentinel: usize = 0;
    unsafe {
        std::ptr::write_volatile(&mut sentinel, sentinel.wrapping_add(1));
    }
    let sp = std::ptr::addr_of!(sentinel) as usize;

    let (low, high) = if sp <= stack_top_hint {
        (sp, stack_top_hint)
    } else {
        (stack_top_hint, sp)
    };

    let align = std::mem::align_of::<usize>();
    let mut current = low & !(align - 1);

    while current + std::mem::size_of::<usize>() <= high {
        // SAFETY: the caller guarantees `[low, high)` lies within the
        // current thread's valid stack region.
        let word = unsafe { std::ptr::read_volatile(current as *const usize) };
        visit(word);
        current += align;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_visits_at_least_one_word_between_a_local_and_an_ancestor_hint() {
        let ancestor_marker: usize = 0;
        let hint = std::ptr::addr_of!(ancestor_marker) as usize;
        let mut visited = 0usize;
        unsafe {
            scan_current_stack(hint, |_word| visited += 1);
        }
        assert!(visited > 0);
    }
}
