//! RRC-Controller: per-cell UE-Manager registry, with a coordinator control
//! loop running on the LTE anchor cell (spec §4.2).
//!
//! Grounded on the teacher's `app/src/main.rs` event loop (`match` over
//! incoming event kinds, dispatching to the right handler) generalized from
//! one BLE peripheral to a per-cell registry of many UE-Managers plus,
//! on the anchor, the periodic SINR-driven planning loop.

use std::collections::HashMap;

use crate::alloc::{PreambleAllocator, RntiAllocator, SrsIndexAllocator};
use crate::config::{compute_ttt, RrcConfig};
use crate::error::{McRrcError, Result};
use crate::ids::{CellId, EpsBearerId, Imsi, LcId, Leg, Rnti};
use crate::mac_phy::{LcInfo, MacControlSap, NonContentionPreamble, PhyControlSap, RachConfig, S1apSap};
use crate::measurement::MeasurementAggregator;
use crate::scheduler::Instant;
use crate::ue_manager::{Effect, TimerKind, UeManager, UeState};

/// Which SINR group a mmWave cell belongs to (spec §4.2: "type A" primary
/// group, e.g. 28 GHz; "type B" secondary group, e.g. 73 GHz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingHandover {
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub scheduled_fire_time: Instant,
    pub target_sinr_db: f64,
    /// When this plan was first decided, kept alongside `scheduled_fire_time`
    /// so a fire can report handover latency for diagnostics (spec §6:
    /// "optional trace outputs... handover start/end events", supplemented
    /// from `examples/original_source`'s `m_imsiHandoverEventsMap`).
    pub scheduled_at: Instant,
}

/// What a coordinator tick asks the caller (the `Network` driver) to do.
/// These name scheduler/X2 actions at a level the controller itself cannot
/// perform, since it does not own the `EventQueue` or `X2Bus` (spec §9:
/// cyclic-reference avoidance).
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEffect {
    SwitchToLte { imsi: Imsi },
    SwitchToMmWave { imsi: Imsi },
    ScheduleHandoverFire { imsi: Imsi, leg: Leg, at: Instant, target_cell: CellId },
    CancelHandoverFire { imsi: Imsi, leg: Leg },
}

/// State that only exists on the coordinator (the LTE anchor cell).
pub struct CoordinatorState {
    cell_groups: HashMap<CellId, Group>,
    pub last_mmwave_cell: HashMap<Imsi, CellId>,
    pub last_mmwave_cell2: HashMap<Imsi, CellId>,
    pub imsi_using_lte: HashMap<Imsi, bool>,
    pub mmwave_cell_setup_completed: HashMap<Imsi, bool>,
    /// One pending-handover table per leg (spec §3: "two parallel tables").
    pending: [HashMap<Imsi, PendingHandover>; 2],
    /// Latency (fire time minus the time the plan was first decided) of the
    /// most recent handover fire, for a host binary's tracing layer to pick
    /// up (spec §6 "optional trace outputs" supplemented feature).
    last_handover_latency: Option<crate::scheduler::Micros>,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self {
            cell_groups: HashMap::new(),
            last_mmwave_cell: HashMap::new(),
            last_mmwave_cell2: HashMap::new(),
            imsi_using_lte: HashMap::new(),
            mmwave_cell_setup_completed: HashMap::new(),
            pending: [HashMap::new(), HashMap::new()],
            last_handover_latency: None,
        }
    }

    pub fn register_mmwave_cell(&mut self, cell: CellId, group: Group) {
        self.cell_groups.insert(cell, group);
    }

    pub fn group_of(&self, cell: CellId) -> Option<Group> {
        self.cell_groups.get(&cell).copied()
    }

    pub fn is_using_lte(&self, imsi: Imsi) -> bool {
        self.imsi_using_lte.get(&imsi).copied().unwrap_or(true)
    }

    pub fn is_setup_completed(&self, imsi: Imsi) -> bool {
        self.mmwave_cell_setup_completed.get(&imsi).copied().unwrap_or(false)
    }

    pub fn pending_for(&self, imsi: Imsi, leg: Leg) -> Option<&PendingHandover> {
        self.pending[leg.index()].get(&imsi)
    }

    fn best_in_group(&self, agg: &MeasurementAggregator, imsi: Imsi, group: Group) -> Option<(CellId, f64)> {
        let mut best: Option<(CellId, f64)> = None;
        for (&cell, &cell_group) in self.cell_groups.iter() {
            if cell_group != group {
                continue;
            }
            if let Some(sinr) = agg.sinr_of(imsi, cell) {
                best = match best {
                    None => Some((cell, sinr)),
                    Some((bc, bs)) if sinr > bs || (sinr == bs && cell < bc) => Some((cell, sinr)),
                    other => other,
                };
            }
        }
        best
    }
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RrcController {
    pub cell: CellId,
    pub config: RrcConfig,
    pub ue_by_rnti: HashMap<Rnti, UeManager>,
    pub imsi_to_rnti: HashMap<Imsi, Rnti>,
    rnti_alloc: RntiAllocator,
    srs_alloc: SrsIndexAllocator,
    preamble_alloc: PreambleAllocator,
    pub coordinator: Option<CoordinatorState>,
}

impl RrcController {
    pub fn new(cell: CellId, config: RrcConfig, is_coordinator: bool) -> Self {
        let srs_periodicity = config.srs_periodicity_ms;
        let mut ctrl = Self {
            cell,
            rnti_alloc: RntiAllocator::new(cell),
            srs_alloc: SrsIndexAllocator::new(cell, srs_periodicity),
            preamble_alloc: PreambleAllocator::new(cell),
            config,
            ue_by_rnti: HashMap::new(),
            imsi_to_rnti: HashMap::new(),
            coordinator: if is_coordinator { Some(CoordinatorState::new()) } else { None },
        };
        // Cell bring-up broadcast over the PHY-Control SAP. No real SIB/MIB
        // contents are modeled (spec §1 non-goal), so these are placeholders
        // rather than fabricated bytes.
        PhyControlSap::set_cell_id(&mut ctrl, cell);
        PhyControlSap::set_bandwidth(&mut ctrl, cell, 100);
        PhyControlSap::set_earfcn(&mut ctrl, cell, 100);
        PhyControlSap::set_mib(&mut ctrl, cell, Vec::new());
        PhyControlSap::set_sib1(&mut ctrl, cell, Vec::new());
        ctrl
    }

    pub fn is_coordinator(&self) -> bool {
        self.coordinator.is_some()
    }

    /// spec §6 `MAC-Control SAP`: RACH response. Allocates an RNTI and
    /// creates a UE-Manager in INITIAL_RANDOM_ACCESS, or rejects admission.
    pub fn handle_rach(&mut self) -> Result<Rnti> {
        if !self.config.admit_rrc_connection_request {
            log::warn!("cell={:?} rejecting RACH: admission closed", self.cell);
            return Err(McRrcError::ConnectionRejected(self.cell));
        }
        let cell = self.cell;
        let _rach_config = MacControlSap::rach_config(self, cell);
        let rnti = self.rnti_alloc.alloc()?;
        MacControlSap::add_ue(self, cell, rnti);
        PhyControlSap::add_ue(self, cell, rnti);
        self.ue_by_rnti.insert(rnti, UeManager::new_on_rach(self.cell, rnti));
        Ok(rnti)
    }

    /// RRC-Connection-Request arrives: bind the IMSI, arm the setup timer.
    pub fn handle_connection_request(&mut self, rnti: Rnti, imsi: Imsi) -> Result<Vec<Effect>> {
        let cell = self.cell;
        let mode = self.config.default_transmission_mode;
        S1apSap::initial_ue_message(self, imsi, rnti);
        PhyControlSap::set_transmission_mode(self, cell, rnti, mode);
        MacControlSap::ue_update_configuration_req(self, cell, rnti, mode);
        let ue = self.ue(rnti)?;
        ue.imsi = Some(imsi);
        ue.state = UeState::ConnectionSetup;
        self.imsi_to_rnti.insert(imsi, rnti);
        Ok(vec![Effect::ArmTimer {
            kind: TimerKind::ConnectionSetup,
            delay: self.config.connection_setup_timeout_us,
        }])
    }

    pub fn handle_connection_setup_complete(&mut self, rnti: Rnti) -> Result<()> {
        let ue = self.ue(rnti)?;
        ue.state = UeState::ConnectedNormally;
        Ok(())
    }

    /// Incoming X2 handover request at the target cell (spec §4.2,
    /// `HandoverRequest`): admits or rejects, allocates a non-contention
    /// RACH preamble, and on admission creates the target-side UE-Manager
    /// in HANDOVER_JOINING with a fresh RNTI.
    pub fn handle_incoming_handover_request(
        &mut self,
        imsi: Imsi,
        source_cell: CellId,
        source_rnti: Rnti,
    ) -> Result<(Rnti, Vec<Effect>)> {
        if !self.config.admit_handover_request {
            log::warn!("cell={:?} denying handover request for imsi={:?} from cell={:?}", self.cell, imsi, source_cell);
            return Err(McRrcError::AdmissionDenied(self.cell));
        }
        let rnti = self.rnti_alloc.alloc()?;
        let cell = self.cell;
        let preamble = MacControlSap::allocate_non_contention_preamble(self, cell, rnti);
        if !preamble.valid {
            self.rnti_alloc.free(rnti);
            return Err(McRrcError::NoPreamble(self.cell));
        }
        let mut ue = UeManager::new_on_handover_joining(self.cell, rnti, imsi, source_cell, source_rnti);
        ue.preamble = Some(preamble.preamble_id);
        ue.prach_mask_index = Some(preamble.prach_mask_index);
        let effects = vec![Effect::ArmTimer {
            kind: TimerKind::HandoverJoining,
            delay: self.config.handover_joining_timeout_us,
        }];
        self.ue_by_rnti.insert(rnti, ue);
        self.imsi_to_rnti.insert(imsi, rnti);
        Ok((rnti, effects))
    }

    pub fn ue(&mut self, rnti: Rnti) -> Result<&mut UeManager> {
        self.ue_by_rnti
            .get_mut(&rnti)
            .ok_or(McRrcError::UnknownUe(self.cell, rnti))
    }

    pub fn ue_for_imsi(&mut self, imsi: Imsi) -> Result<&mut UeManager> {
        let rnti = *self.imsi_to_rnti.get(&imsi).ok_or(McRrcError::UnknownImsi(imsi))?;
        self.ue(rnti)
    }

    /// Tear down a UE-Manager and release its resources. Called on
    /// `Effect::Destroy`/`DestroyAfter`, `UeContextRelease`, or explicit
    /// release.
    pub fn destroy_ue(&mut self, rnti: Rnti) {
        if let Some(ue) = self.ue_by_rnti.remove(&rnti) {
            self.rnti_alloc.free(rnti);
            if let Some(preamble) = ue.preamble {
                self.preamble_alloc.free(preamble);
            }
            let cell = self.cell;
            if let Some(imsi) = ue.imsi {
                for bearer in ue.bearers.iter() {
                    MacControlSap::release_logical_channel(self, cell, rnti, bearer.lc_id);
                    S1apSap::send_release_indication(self, imsi, rnti, bearer.eps_bearer_id);
                }
            }
            MacControlSap::remove_ue(self, cell, rnti);
            if let Some(imsi) = ue.imsi {
                if self.imsi_to_rnti.get(&imsi) == Some(&rnti) {
                    self.imsi_to_rnti.remove(&imsi);
                }
            }
        }
    }

    pub fn alloc_srs_index(&mut self) -> Result<u16> {
        self.srs_alloc.alloc()
    }

    /// spec §4.2: the coordinator's periodic control-loop tick. Only valid
    /// on the coordinator; returns `InvalidState` otherwise.
    pub fn tick(&mut self, agg: &MeasurementAggregator, now: Instant) -> Result<Vec<ControlEffect>> {
        let coord = self
            .coordinator
            .as_mut()
            .ok_or(McRrcError::InvalidState("tick called on a non-coordinator cell"))?;

        let mut effects = vec![];

        for imsi in agg.known_imsis().collect::<Vec<_>>() {
            let max_a = coord.best_in_group(agg, imsi, Group::A);
            let max_b = coord.best_in_group(agg, imsi, Group::B);

            let max_db = max_a.map(|(_, s)| s);
            let using_lte = coord.is_using_lte(imsi);

            let in_outage = match max_db {
                None => true,
                Some(db) => {
                    db < self.config.outage_threshold_db
                        || (using_lte && db < self.config.outage_threshold_db + 2.0)
                }
            };

            if in_outage {
                if !using_lte {
                    coord.imsi_using_lte.insert(imsi, true);
                    effects.push(ControlEffect::SwitchToLte { imsi });
                }
                for leg in [Leg::Primary, Leg::Secondary] {
                    if coord.pending[leg.index()].remove(&imsi).is_some() {
                        effects.push(ControlEffect::CancelHandoverFire { imsi, leg });
                    }
                }
                continue;
            }

            if using_lte {
                coord.imsi_using_lte.insert(imsi, false);
                effects.push(ControlEffect::SwitchToMmWave { imsi });
            }

            for (leg, max_cell) in [(Leg::Primary, max_a), (Leg::Secondary, max_b)] {
                let Some((max_cell_id, max_cell_db)) = max_cell else {
                    continue;
                };
                let current_cell = match leg {
                    Leg::Primary => coord.last_mmwave_cell.get(&imsi).copied(),
                    Leg::Secondary => coord.last_mmwave_cell2.get(&imsi).copied(),
                };
                let current_db = current_cell.and_then(|c| agg.sinr_of(imsi, c));
                let delta = current_db.map(|c| (max_cell_db - c).abs()).unwrap_or(f64::MAX);

                let existing = coord.pending[leg.index()].get(&imsi).copied();
                match existing {
                    Some(p) if p.target_cell == max_cell_id => {
                        if current_db.map(|d| d < self.config.outage_threshold_db).unwrap_or(true) {
                            if p.scheduled_fire_time > now {
                                coord.pending[leg.index()].insert(
                                    imsi,
                                    PendingHandover {
                                        scheduled_fire_time: now,
                                        ..p
                                    },
                                );
                                // scheduled_at carries over via ..p: the plan itself isn't new.
                                effects.push(ControlEffect::ScheduleHandoverFire {
                                    imsi,
                                    leg,
                                    at: now,
                                    target_cell: max_cell_id,
                                });
                            }
                        } else {
                            let ttt = compute_ttt(&self.config, delta);
                            let new_fire = now + ttt;
                            if new_fire < p.scheduled_fire_time {
                                coord.pending[leg.index()].insert(
                                    imsi,
                                    PendingHandover {
                                        scheduled_fire_time: new_fire,
                                        ..p
                                    },
                                );
                                effects.push(ControlEffect::ScheduleHandoverFire {
                                    imsi,
                                    leg,
                                    at: new_fire,
                                    target_cell: max_cell_id,
                                });
                            }
                        }
                    }
                    Some(p) => {
                        if max_cell_db - p.target_sinr_db > self.config.sinr_threshold_difference_db {
                            let ttt = compute_ttt(&self.config, delta);
                            let fire_at = now + ttt;
                            coord.pending[leg.index()].insert(
                                imsi,
                                PendingHandover {
                                    source_cell: current_cell.unwrap_or(self.cell),
                                    target_cell: max_cell_id,
                                    scheduled_fire_time: fire_at,
                                    target_sinr_db: max_cell_db,
                                    scheduled_at: now,
                                },
                            );
                            effects.push(ControlEffect::CancelHandoverFire { imsi, leg });
                            effects.push(ControlEffect::ScheduleHandoverFire {
                                imsi,
                                leg,
                                at: fire_at,
                                target_cell: max_cell_id,
                            });
                        }
                    }
                    None => {
                        if current_cell != Some(max_cell_id) {
                            let ttt = compute_ttt(&self.config, delta);
                            let fire_at = now + ttt;
                            coord.pending[leg.index()].insert(
                                imsi,
                                PendingHandover {
                                    source_cell: current_cell.unwrap_or(self.cell),
                                    target_cell: max_cell_id,
                                    scheduled_fire_time: fire_at,
                                    target_sinr_db: max_cell_db,
                                    scheduled_at: now,
                                },
                            );
                            effects.push(ControlEffect::ScheduleHandoverFire {
                                imsi,
                                leg,
                                at: fire_at,
                                target_cell: max_cell_id,
                            });
                        }
                    }
                }
            }
        }

        Ok(effects)
    }

    /// spec §4.2 "Handover fire": called by the `Network` driver when a
    /// scheduled handover event pops due. Only fires if
    /// `mmWaveCellSetupCompleted[imsi]` is still true; returns the target
    /// cell to send the `McHandoverRequest` to, or `None` if the fire was
    /// stale (superseded/cancelled since scheduling, observed as a no-op).
    pub fn fire_handover(&mut self, imsi: Imsi, leg: Leg, now: Instant) -> Option<CellId> {
        let coord = self.coordinator.as_mut()?;
        if !coord.is_setup_completed(imsi) {
            return None;
        }
        let pending = coord.pending[leg.index()].remove(&imsi)?;
        coord.mmwave_cell_setup_completed.insert(imsi, false);
        coord.last_handover_latency = Some(now.saturating_sub(pending.scheduled_at));
        match leg {
            Leg::Primary => {
                coord.last_mmwave_cell.insert(imsi, pending.target_cell);
            }
            Leg::Secondary => {
                coord.last_mmwave_cell2.insert(imsi, pending.target_cell);
            }
        }
        Some(pending.target_cell)
    }

    /// Latency of the most recent fire on this cell's coordinator, if any,
    /// for a host binary's tracing layer to pick up.
    pub fn take_last_handover_latency(&mut self) -> Option<crate::scheduler::Micros> {
        self.coordinator.as_mut()?.last_handover_latency.take()
    }
}

/// spec §6 MAC-Control SAP, implemented directly against this cell's own
/// allocators: there is no separate MAC process in this simulation for the
/// call to cross into.
impl MacControlSap for RrcController {
    fn add_ue(&mut self, cell: CellId, rnti: Rnti) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} mac: add_ue rnti={:?}", self.cell, rnti);
    }

    fn remove_ue(&mut self, cell: CellId, rnti: Rnti) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} mac: remove_ue rnti={:?}", self.cell, rnti);
    }

    fn add_logical_channel(&mut self, cell: CellId, lc: LcInfo) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} mac: add_logical_channel rnti={:?} lcid={:?}", self.cell, lc.rnti, lc.lcid);
    }

    fn release_logical_channel(&mut self, cell: CellId, rnti: Rnti, lcid: LcId) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} mac: release_logical_channel rnti={:?} lcid={:?}", self.cell, rnti, lcid);
    }

    fn allocate_non_contention_preamble(&mut self, cell: CellId, rnti: Rnti) -> NonContentionPreamble {
        debug_assert_eq!(cell, self.cell);
        match self.preamble_alloc.alloc() {
            Ok(id) => {
                log::debug!("cell={:?} mac: allocated preamble={} for rnti={:?}", self.cell, id, rnti);
                NonContentionPreamble { valid: true, preamble_id: id, prach_mask_index: 0 }
            }
            Err(_) => {
                log::warn!("cell={:?} mac: no preamble available for rnti={:?}", self.cell, rnti);
                NonContentionPreamble { valid: false, preamble_id: 0, prach_mask_index: 0 }
            }
        }
    }

    fn rach_config(&self, cell: CellId) -> RachConfig {
        debug_assert_eq!(cell, self.cell);
        RachConfig {
            number_of_preambles: 64,
            preamble_trans_max: 10,
            ra_response_window_size: 10,
        }
    }

    fn ue_update_configuration_req(&mut self, cell: CellId, rnti: Rnti, transmission_mode: u8) {
        debug_assert_eq!(cell, self.cell);
        log::debug!(
            "cell={:?} mac: ue_update_configuration_req rnti={:?} mode={}",
            self.cell, rnti, transmission_mode
        );
    }
}

/// spec §6 PHY-Control SAP; see [`MacControlSap`] above for why this is a
/// direct `impl` rather than an injected implementor.
impl PhyControlSap for RrcController {
    fn add_ue(&mut self, cell: CellId, rnti: Rnti) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: add_ue rnti={:?}", self.cell, rnti);
    }

    fn set_transmission_mode(&mut self, cell: CellId, rnti: Rnti, mode: u8) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: set_transmission_mode rnti={:?} mode={}", self.cell, rnti, mode);
    }

    fn set_srs_configuration_index(&mut self, cell: CellId, rnti: Rnti, index: u16) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: set_srs_configuration_index rnti={:?} index={}", self.cell, rnti, index);
    }

    fn set_cell_id(&mut self, cell: CellId) {
        log::debug!("phy: set_cell_id {:?}", cell);
    }

    fn set_bandwidth(&mut self, cell: CellId, bandwidth_rbs: u16) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: set_bandwidth {}", self.cell, bandwidth_rbs);
    }

    fn set_earfcn(&mut self, cell: CellId, earfcn: u32) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: set_earfcn {}", self.cell, earfcn);
    }

    fn set_sib1(&mut self, cell: CellId, sib1: Vec<u8>) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: set_sib1 len={}", self.cell, sib1.len());
    }

    fn set_mib(&mut self, cell: CellId, mib: Vec<u8>) {
        debug_assert_eq!(cell, self.cell);
        log::debug!("cell={:?} phy: set_mib len={}", self.cell, mib.len());
    }
}

/// spec §6 S1-AP SAP: initial attach and the path-switch/release-indication
/// steps of a handover.
impl S1apSap for RrcController {
    fn initial_ue_message(&mut self, imsi: Imsi, rnti: Rnti) {
        log::debug!("cell={:?} s1ap: initial_ue_message imsi={:?} rnti={:?}", self.cell, imsi, rnti);
    }

    fn path_switch_request(&mut self, rnti: Rnti, cell: CellId, imsi: Imsi, bearers_to_switch: Vec<EpsBearerId>) {
        debug_assert_eq!(cell, self.cell);
        log::debug!(
            "cell={:?} s1ap: path_switch_request rnti={:?} imsi={:?} bearers={}",
            self.cell,
            rnti,
            imsi,
            bearers_to_switch.len()
        );
    }

    fn send_release_indication(&mut self, imsi: Imsi, rnti: Rnti, bearer_id: EpsBearerId) {
        log::debug!(
            "cell={:?} s1ap: send_release_indication imsi={:?} rnti={:?} bearer={:?}",
            self.cell, imsi, rnti, bearer_id
        );
    }
}
