use super::Address;
use std::collections::HashMap;

/// ## Free store
///
/// A first-fit free-list allocator over the heap region of the data
/// segment. Blocks are variable-sized; freed blocks coalesce with free
/// neighbours. Live allocations are remembered so `dispose` of an
/// address that was never handed out is detected.
#[derive(Debug)]
pub struct FreeStore {
    free: Vec<(Address, usize)>,
    allocated: HashMap<Address, usize>,
}

impl FreeStore {
    /// Manage the address range `[base, base + size)`.
    pub fn new(base: Address, size: usize) -> FreeStore {
        FreeStore {
            free: vec![(base, size)],
            allocated: HashMap::new(),
        }
    }

    /// Allocate `n` datums; `None` when no block is large enough.
    pub fn alloc(&mut self, n: usize) -> Option<Address> {
        if n == 0 {
            return None;
        }
        let slot = self.free.iter().position(|&(_, size)| size >= n)?;
        let (addr, size) = self.free[slot];
        if size == n {
            self.free.remove(slot);
        } else {
            self.free[slot] = (addr + n, size - n);
        }
        self.allocated.insert(addr, n);
        Some(addr)
    }

    /// Return a block to the free list. Fails unless `addr` is the
    /// start of a live allocation.
    pub fn free(&mut self, addr: Address) -> Result<(), ()> {
        let n = self.allocated.remove(&addr).ok_or(())?;
        let at = self
            .free
            .iter()
            .position(|&(a, _)| a > addr)
            .unwrap_or(self.free.len());
        self.free.insert(at, (addr, n));
        // Coalesce with the following block, then the preceding one.
        if at + 1 < self.free.len() && addr + n == self.free[at + 1].0 {
            self.free[at].1 += self.free[at + 1].1;
            self.free.remove(at + 1);
        }
        if at > 0 && self.free[at - 1].0 + self.free[at - 1].1 == addr {
            self.free[at - 1].1 += self.free[at].1;
            self.free.remove(at);
        }
        Ok(())
    }

    /// Datums currently handed out; used by tests and the verbose
    /// summary.
    pub fn in_use(&self) -> usize {
        self.allocated.values().sum()
    }
}
