//! External interface traits: the seams where this core hands control
//! decisions down to a MAC/PHY implementation and up to the core network
//! (S1-AP), and the RLC-kind factory driven by bearer configuration.
//!
//! Spec §1 non-goal: no PHY-layer simulation lives in this crate. Since an
//! eNB's RRC and its co-located MAC/PHY/S1-AP interfaces are the same
//! trust boundary, not a second process, `RrcController` implements all
//! three traits directly against its own cell and resource allocators
//! rather than taking an injected implementor; the bodies log what would
//! have crossed the boundary, mirroring the way the teacher's `Controller`
//! trait in `hci.rs` is implemented once for the real radio coprocessor
//! and is otherwise free to be stubbed out in tests.

use crate::config::RrcConfig;
use crate::ids::{CellId, EpsBearerId, Imsi, LcId, Rnti};
use crate::rlc::{rlc_kind_for_bearer, RlcEntity, RlcKind};

/// Outcome of a non-contention RACH preamble reservation: the preamble
/// itself plus the PRACH mask index that restricts which RACH occasion the
/// UE may answer on. Kept as one struct, not a bare tuple, so the mask index
/// survives alongside the preamble through `HANDOVER_JOINING` instead of
/// being dropped at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonContentionPreamble {
    pub valid: bool,
    pub preamble_id: u8,
    pub prach_mask_index: u8,
}

/// RACH configuration a cell's MAC exposes to RRC at setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RachConfig {
    pub number_of_preambles: u8,
    pub preamble_trans_max: u8,
    pub ra_response_window_size: u8,
}

/// A logical channel descriptor handed to the MAC when a bearer is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcInfo {
    pub rnti: Rnti,
    pub lcid: LcId,
    pub eps_bearer_id: EpsBearerId,
}

/// Decisions a cell's MAC needs told about: RNTI lifecycle, logical-channel
/// (de)configuration, and non-contention preamble/RACH-config lookups.
pub trait MacControlSap {
    fn add_ue(&mut self, cell: CellId, rnti: Rnti);
    fn remove_ue(&mut self, cell: CellId, rnti: Rnti);
    fn add_logical_channel(&mut self, cell: CellId, lc: LcInfo);
    fn release_logical_channel(&mut self, cell: CellId, rnti: Rnti, lcid: LcId);
    fn allocate_non_contention_preamble(&mut self, cell: CellId, rnti: Rnti) -> NonContentionPreamble;
    fn rach_config(&self, cell: CellId) -> RachConfig;
    fn ue_update_configuration_req(&mut self, cell: CellId, rnti: Rnti, transmission_mode: u8);
}

/// PHY-facing control surface: RRC hands down connection reconfiguration,
/// measurement-config and cell-identity instructions here.
pub trait PhyControlSap {
    fn add_ue(&mut self, cell: CellId, rnti: Rnti);
    fn set_transmission_mode(&mut self, cell: CellId, rnti: Rnti, mode: u8);
    fn set_srs_configuration_index(&mut self, cell: CellId, rnti: Rnti, index: u16);
    fn set_cell_id(&mut self, cell: CellId);
    fn set_bandwidth(&mut self, cell: CellId, bandwidth_rbs: u16);
    fn set_earfcn(&mut self, cell: CellId, earfcn: u32);
    fn set_sib1(&mut self, cell: CellId, sib1: Vec<u8>);
    fn set_mib(&mut self, cell: CellId, mib: Vec<u8>);
}

/// Core-network facing surface (S1-AP), used at initial attach and for the
/// path-switch step of an LTE handover.
pub trait S1apSap {
    fn initial_ue_message(&mut self, imsi: Imsi, rnti: Rnti);
    fn path_switch_request(
        &mut self,
        rnti: Rnti,
        cell: CellId,
        imsi: Imsi,
        bearers_to_switch: Vec<EpsBearerId>,
    );
    fn send_release_indication(&mut self, imsi: Imsi, rnti: Rnti, bearer_id: EpsBearerId);
}

/// Build a fresh RLC entity for a new bearer, using the cell's configured
/// mapping policy. `per` is the packet-error-rate estimate used by
/// [`EpsBearerToRlcMapping::PerBased`]; callers that don't track PER yet
/// pass `0.0`, which always resolves to AM.
pub fn new_rlc_entity(config: &RrcConfig, per: f64) -> RlcEntity {
    RlcEntity::new(rlc_kind_for_bearer(config.eps_bearer_to_rlc_mapping, per))
}

pub fn is_am(kind: RlcKind) -> bool {
    matches!(kind, RlcKind::Am)
}
