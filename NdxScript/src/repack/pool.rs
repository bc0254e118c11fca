//! Free-space pools

/// A free region: where the next write goes and how much room is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpacePool {
    pub start: usize,
    pub remaining: usize,
}

/// First-fit allocator over pools sorted once by size.
///
/// Pools are ordered by their initial size, smallest first, and never
/// re-sorted or merged as they shrink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolAllocator {
    pools: Vec<FreeSpacePool>,
}

impl PoolAllocator {
    pub fn new(mut pools: Vec<FreeSpacePool>) -> Self {
        pools.sort_by_key(|p| p.remaining);
        Self { pools }
    }

    /// Pools from `[start, end)` safe areas.
    pub fn from_safe_areas(areas: &[(usize, usize)]) -> Self {
        Self::new(
            areas
                .iter()
                .map(|&(start, end)| FreeSpacePool {
                    start,
                    remaining: end.saturating_sub(start),
                })
                .collect(),
        )
    }

    /// Take `len` bytes from the first pool with room. Returns the offset.
    pub fn allocate(&mut self, len: usize) -> Option<usize> {
        let pool = self.pools.iter_mut().find(|p| len <= p.remaining)?;
        let offset = pool.start;
        pool.start += len;
        pool.remaining -= len;
        Some(offset)
    }

    pub fn pools(&self) -> &[FreeSpacePool] {
        &self.pools
    }

    pub fn remaining(&self) -> usize {
        self.pools.iter().map(|p| p.remaining).sum()
    }
}
