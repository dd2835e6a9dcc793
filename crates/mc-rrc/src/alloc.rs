//! Resource allocators shared by a cell: RNTIs, DRB-IDs, SRS indices and
//! RACH preambles. All four follow the same free-list-before-expansion
//! policy (spec §9 supplemented feature, property 10): a released id goes
//! onto a free list and is handed out again before any id beyond the
//! high-water mark is minted, so ids stay low and dense under churn.
//!
//! Grounded on the teacher's `tl_mbox` ref-table bookkeeping, which tracks a
//! small fixed pool of channel buffers and reuses freed slots rather than
//! growing unbounded.

use std::collections::VecDeque;

use crate::error::{McRrcError, Result};
use crate::ids::CellId;

/// A free-list allocator over a dense id range `[low, high]` (inclusive),
/// generic over which concrete id type wraps the `u16`/`u8` it hands out.
#[derive(Debug, Clone)]
pub struct FreeListAllocator {
    low: u32,
    high: u32,
    next_fresh: u32,
    free: VecDeque<u32>,
}

impl FreeListAllocator {
    pub fn new(low: u32, high: u32) -> Self {
        Self {
            low,
            high,
            next_fresh: low,
            free: VecDeque::new(),
        }
    }

    /// Allocate the next id: a previously released one if available,
    /// otherwise the next unused id in range.
    pub fn alloc(&mut self) -> Option<u32> {
        if let Some(id) = self.free.pop_front() {
            return Some(id);
        }
        if self.next_fresh > self.high {
            return None;
        }
        let id = self.next_fresh;
        self.next_fresh += 1;
        Some(id)
    }

    /// Release an id back to the free list. Releasing an id outside
    /// `[low, next_fresh)` is a caller bug and is ignored, not panicked on,
    /// since a release is usually driven by cleanup code that must not
    /// itself fail.
    pub fn free(&mut self, id: u32) {
        if id >= self.low && id < self.next_fresh && !self.free.contains(&id) {
            self.free.push_back(id);
        }
    }

    pub fn in_use_count(&self) -> u32 {
        (self.next_fresh - self.low) - self.free.len() as u32
    }
}

/// RNTI allocator for one cell. RNTI 0 is reserved (spec §9), so the usable
/// range is `[1, 65535]`.
#[derive(Debug, Clone)]
pub struct RntiAllocator {
    inner: FreeListAllocator,
    cell: CellId,
}

impl RntiAllocator {
    pub fn new(cell: CellId) -> Self {
        Self {
            inner: FreeListAllocator::new(1, u16::MAX as u32),
            cell,
        }
    }

    pub fn alloc(&mut self) -> Result<crate::ids::Rnti> {
        self.inner
            .alloc()
            .map(|v| crate::ids::Rnti(v as u16))
            .ok_or(McRrcError::NoRntiAvailable(self.cell))
    }

    pub fn free(&mut self, rnti: crate::ids::Rnti) {
        self.inner.free(rnti.0 as u32);
    }
}

/// DRB-ID allocator for one UE: ids cycle through `[1, 31]` (property 9);
/// DRB-ID 0 is never allocated, matching the reserved "no bearer" sentinel.
#[derive(Debug, Clone)]
pub struct DrbIdAllocator {
    inner: FreeListAllocator,
    cell: CellId,
}

impl DrbIdAllocator {
    pub fn new(cell: CellId) -> Self {
        Self {
            inner: FreeListAllocator::new(1, 31),
            cell,
        }
    }

    pub fn alloc(&mut self, rnti: crate::ids::Rnti) -> Result<crate::ids::DrbId> {
        self.inner
            .alloc()
            .map(|v| crate::ids::DrbId(v as u8))
            .ok_or(McRrcError::ResourceExhausted(self.cell, rnti))
    }

    pub fn free(&mut self, drb: crate::ids::DrbId) {
        self.inner.free(drb.0 as u32);
    }
}

/// SRS (Sounding Reference Signal) index allocator. Range depends on the
/// configured SRS periodicity (spec §9 supplemented feature); e.g. a 20ms
/// periodicity provides indices `[0, 20)` minus the one subframe reserved
/// for PRACH in FDD configuration, simplified here to the full range since
/// PRACH subframe exclusion does not affect allocator ordering semantics.
#[derive(Debug, Clone)]
pub struct SrsIndexAllocator {
    inner: FreeListAllocator,
    cell: CellId,
}

impl SrsIndexAllocator {
    pub fn new(cell: CellId, periodicity: u16) -> Self {
        Self {
            inner: FreeListAllocator::new(0, periodicity.saturating_sub(1) as u32),
            cell,
        }
    }

    pub fn alloc(&mut self) -> Result<u16> {
        self.inner
            .alloc()
            .map(|v| v as u16)
            .ok_or(McRrcError::ResourceExhausted(self.cell, crate::ids::Rnti::UNKNOWN))
    }

    pub fn free(&mut self, index: u16) {
        self.inner.free(index as u32);
    }
}

/// Non-contention RACH preamble allocator, 64 preambles per cell minus
/// whatever the system reserves for contention-based access; modeled here
/// as the full `[0, 63]` range since the split is a PHY-layer concern out of
/// scope for this core (spec §1 non-goal).
#[derive(Debug, Clone)]
pub struct PreambleAllocator {
    inner: FreeListAllocator,
    cell: CellId,
}

impl PreambleAllocator {
    pub fn new(cell: CellId) -> Self {
        Self {
            inner: FreeListAllocator::new(0, 63),
            cell,
        }
    }

    pub fn alloc(&mut self) -> Result<u8> {
        self.inner
            .alloc()
            .map(|v| v as u8)
            .ok_or(McRrcError::NoPreamble(self.cell))
    }

    pub fn free(&mut self, preamble: u8) {
        self.inner.free(preamble as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_ids_are_reused_before_expansion() {
        let mut a = FreeListAllocator::new(1, 3);
        let x = a.alloc().unwrap();
        let y = a.alloc().unwrap();
        assert_eq!((x, y), (1, 2));
        a.free(x);
        // Next alloc must reuse 1, not mint 3.
        assert_eq!(a.alloc(), Some(1));
        assert_eq!(a.alloc(), Some(3));
        assert_eq!(a.alloc(), None);
    }

    #[test]
    fn drb_ids_never_allocate_zero() {
        let mut d = DrbIdAllocator::new(CellId(1));
        for expected in 1..=31u8 {
            let got = d.alloc(crate::ids::Rnti(5)).unwrap();
            assert_eq!(got.0, expected);
        }
        assert!(d.alloc(crate::ids::Rnti(5)).is_err());
    }

    #[test]
    fn rnti_allocator_exhaustion_reports_cell() {
        let mut r = RntiAllocator::new(CellId(7));
        r.inner = FreeListAllocator::new(1, 1);
        r.alloc().unwrap();
        match r.alloc() {
            Err(McRrcError::NoRntiAvailable(CellId(7))) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
