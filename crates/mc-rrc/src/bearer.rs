//! Per-UE bearer bookkeeping: the DRB table a UE-Manager owns, plus the
//! shape of one remote RLC leg hosted on its behalf at a secondary cell.
//!
//! Grounded on the teacher's `Ble` struct holding a small table of
//! in-flight state keyed by a short id (there, L2CAP channel ids; here,
//! DRB-IDs), generalized from a handful of fixed slots to the
//! [`crate::alloc::DrbIdAllocator`]'s dense 1..=31 range.

use crate::alloc::DrbIdAllocator;
use crate::error::{McRrcError, Result};
use crate::ids::{CellId, DrbId, EpsBearerId, LcId, Rnti};
use crate::pdcp::PdcpEntity;
use crate::rlc::RlcEntity;

/// One data radio bearer as seen from the anchor (LTE) cell's UE-Manager.
pub struct BearerInfo {
    pub eps_bearer_id: EpsBearerId,
    pub drb_id: DrbId,
    pub lc_id: LcId,
    pub pdcp: PdcpEntity,
    /// The LTE-local RLC leg. Always present; the mmWave legs terminate at
    /// the secondary cell(s) instead, tracked there as [`RemoteRlcInfo`]
    /// entries on that cell's own UE-Manager, since RLC termination is
    /// local to whichever cell is doing the forwarding.
    pub lte_rlc: RlcEntity,
    /// True once this bearer has been split across at least one mmWave leg
    /// (spec §4.1.2).
    pub is_mc: bool,
    /// True once both mmWave legs (group A and group B) are attached.
    pub is_mc_dual: bool,
}

impl BearerInfo {
    pub fn new(eps_bearer_id: EpsBearerId, drb_id: DrbId, lc_id: LcId, lte_rlc: RlcEntity) -> Self {
        Self {
            eps_bearer_id,
            drb_id,
            lc_id,
            pdcp: PdcpEntity::new(),
            lte_rlc,
            is_mc: false,
            is_mc_dual: false,
        }
    }
}

/// Table of a UE's bearers, keyed by DRB-ID, with its own id allocator.
pub struct BearerTable {
    cell: CellId,
    rnti: Rnti,
    allocator: DrbIdAllocator,
    bearers: Vec<BearerInfo>,
}

impl BearerTable {
    pub fn new(cell: CellId, rnti: Rnti) -> Self {
        Self {
            cell,
            rnti,
            allocator: DrbIdAllocator::new(cell),
            bearers: Vec::new(),
        }
    }

    pub fn setup(
        &mut self,
        eps_bearer_id: EpsBearerId,
        lte_rlc: RlcEntity,
    ) -> Result<DrbId> {
        let drb_id = self.allocator.alloc(self.rnti)?;
        let lc_id = LcId(drb_id.0 + 2); // LC-ID 0/1 reserved for SRBs.
        self.bearers
            .push(BearerInfo::new(eps_bearer_id, drb_id, lc_id, lte_rlc));
        Ok(drb_id)
    }

    pub fn release(&mut self, drb_id: DrbId) -> Result<()> {
        let pos = self
            .bearers
            .iter()
            .position(|b| b.drb_id == drb_id)
            .ok_or(McRrcError::UnknownDrb(self.cell, drb_id, self.rnti))?;
        self.bearers.remove(pos);
        self.allocator.free(drb_id);
        Ok(())
    }

    pub fn get(&self, drb_id: DrbId) -> Result<&BearerInfo> {
        self.bearers
            .iter()
            .find(|b| b.drb_id == drb_id)
            .ok_or(McRrcError::UnknownDrb(self.cell, drb_id, self.rnti))
    }

    pub fn get_mut(&mut self, drb_id: DrbId) -> Result<&mut BearerInfo> {
        self.bearers
            .iter_mut()
            .find(|b| b.drb_id == drb_id)
            .ok_or(McRrcError::UnknownDrb(self.cell, drb_id, self.rnti))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BearerInfo> {
        self.bearers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BearerInfo> {
        self.bearers.iter_mut()
    }

    pub fn by_eps_id(&self, eps: EpsBearerId) -> Option<&BearerInfo> {
        self.bearers.iter().find(|b| b.eps_bearer_id == eps)
    }
}

/// One remote RLC leg anchored at a secondary (mmWave) cell, on behalf of a
/// UE whose RRC anchor is a different (LTE) cell. Spec §4.1.2/§4.2: the
/// secondary cell terminates RLC locally and only forwards PDCP PDUs back
/// over X2 to/from the anchor.
pub struct RemoteRlcInfo {
    /// Anchor cell and RNTI the UE is known by there.
    pub anchor_cell: CellId,
    pub anchor_rnti: Rnti,
    /// RNTI the UE was assigned locally at this secondary cell.
    pub local_rnti: Rnti,
    pub drb_id: DrbId,
    pub lc_id: LcId,
    pub rlc: RlcEntity,
}
