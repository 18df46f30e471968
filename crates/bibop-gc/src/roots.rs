//! Root registry: addresses of client variables that hold managed pointers.
//!
//! Grounded in `rudo-gc/src/roots.rs`'s `ShadowStack` (a `Vec`-backed root
//! list with push/pop-by-value), adapted from storing typed `Gc` pointers to
//! storing the *addresses of client variables* (so the current pointer value
//! is re-read on every scan), and from swap-remove to vacancy-leaving
//! removal, so that a client holding onto an index into the registry across
//! an unroot/root pair of other entries isn't silently invalidated.

/// Initial capacity allocated on the first `root()` call.
pub const INITIAL_CAPACITY: usize = 16;

/// Dynamic array of addresses of client variables holding managed pointers.
pub struct RootRegistry {
    entries: Vec<Option<usize>>,
}

impl RootRegistry {
    /// An empty registry; capacity is allocated lazily on first use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `addr`. A null address is a no-op. Re-registering an address
    /// already present is idempotent.
    pub fn root(&mut self, addr: usize) {
        if addr == 0 {
            return;
        }
        if self.entries.iter().flatten().any(|&a| a == addr) {
            return;
        }
        if self.entries.is_empty() {
            self.entries.reserve(INITIAL_CAPACITY);
        }
        if let Some(slot) = self.entries.iter_mut().find(|e| e.is_none()) {
            *slot = Some(addr);
            return;
        }
        if self.entries.len() == self.entries.capacity() {
            self.entries.reserve(self.entries.capacity().max(1));
        }
        self.entries.push(Some(addr));
    }

    /// Deregister `addr`. A null address is a no-op. Returns whether a
    /// matching entry was found and cleared.
    pub fn unroot(&mut self, addr: usize) -> bool {
        if addr == 0 {
            return false;
        }
        for entry in &mut self.entries {
            if *entry == Some(addr) {
                *entry = None;
                return true;
            }
        }
        false
    }

    /// Iterate the current pointer *values* stored at each rooted address,
    /// dereferencing each address once to obtain the current pointer value.
    ///
    /// # Safety
    ///
    /// Every registered address must still point to a valid, readable
    /// `usize`-sized client variable.
    pub unsafe fn iter_values(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .flatten()
            .map(|&addr| unsafe { (addr as *const usize).read_volatile() })
    }

    /// Number of non-vacant entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Whether there are no rooted addresses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RootRegistry {
    fn default() -> Self {
        Self::new()
    }
}
