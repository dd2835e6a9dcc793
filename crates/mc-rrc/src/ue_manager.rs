//! UE-Manager: per-(cell, RNTI) control-plane state machine.
//!
//! Grounded on the teacher's `Ble` struct as the shape of a per-peer state
//! object (signal/state fields, methods that both mutate local state and
//! hand back what the caller owes the outside world) generalized from one
//! connection's worth of state to the full RRC lifecycle in spec §4.1. Each
//! operation returns a `Vec<Effect>` rather than reaching out to the X2-Bus
//! or scheduler directly, the same separation the teacher keeps between
//! `Ble` (state) and the `main` loop (what to do with it) in `app/src/main.rs`.

use std::collections::{HashMap, VecDeque};

use crate::bearer::{BearerTable, RemoteRlcInfo};
use crate::error::{McRrcError, Result};
use crate::ids::{CellId, DrbId, EpsBearerId, Imsi, Leg, Rnti, Teid};
use crate::pdcp::PdcpPath;
use crate::rlc::{ForwardMode, RlcEntity};
use crate::scheduler::{EventId, Micros};
use crate::x2::X2Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeState {
    InitialRandomAccess,
    ConnectionSetup,
    ConnectionRejected,
    ConnectedNormally,
    ConnectionReconfiguration,
    ConnectionReestablishment,
    HandoverPreparation,
    HandoverJoining,
    HandoverPathSwitch,
    HandoverLeaving,
    PrepareMcConnectionReconfiguration,
    McConnectionReconfiguration,
}

/// Which per-state timeout is armed; at most one is ever outstanding (spec
/// §4.1: "exactly one timer is armed per state that has one").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ConnectionRequest,
    ConnectionSetup,
    ConnectionRejected,
    HandoverJoining,
    HandoverLeaving,
}

/// Everything a UE-Manager operation hands back to its caller (the owning
/// RRC-Controller) to act on: messages to put on the X2-Bus, timers to
/// (re)arm, and lifecycle notifications. The UE-Manager never touches the
/// bus or the scheduler directly (spec §9: cyclic-reference avoidance via
/// arena+index — the UE-Manager holds no reference back to its controller).
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SendX2 { to: CellId, message: X2Message },
    ArmTimer { kind: TimerKind, delay: Micros },
    /// The UE-Manager should be torn down: release its RNTI, cancel its
    /// timer, and drop it from the cell's UE-map.
    Destroy,
    /// Destroy after a grace period rather than immediately (spec §7:
    /// HANDOVER_JOINING timeout on an MC secondary leg).
    DestroyAfter { delay: Micros },
}

/// One data radio bearer's setup request, as `setupDataRadioBearer` takes it.
pub struct SetupBearerRequest {
    pub eps_bearer_id: EpsBearerId,
    pub transport_teid: Teid,
    pub rlc: RlcEntity,
}

pub struct UeManager {
    pub cell: CellId,
    pub rnti: Rnti,
    pub imsi: Option<Imsi>,
    pub state: UeState,
    /// Attached as mmWave-A secondary leg.
    pub is_mc: bool,
    /// Attached as mmWave-B secondary leg.
    pub is_mc2: bool,
    /// Set on HANDOVER_JOINING: where this UE is handing over from.
    pub source_cell: Option<CellId>,
    pub source_rnti: Option<Rnti>,
    pub peer_primary: Option<(CellId, Rnti)>,
    pub peer_secondary: Option<(CellId, Rnti)>,
    pub bearers: BearerTable,
    /// DRB-ID -> RemoteRlcInfo, populated when this cell only hosts the RLC
    /// end of a split bearer whose PDCP lives on the anchor (spec §3).
    pub remote_rlc: HashMap<DrbId, RemoteRlcInfo>,
    /// A `prepareHandover` call received while in CONNECTION_RECONFIGURATION
    /// or HANDOVER_JOINING is queued here and replayed on the next entry
    /// into CONNECTED_NORMALLY (spec §4.1: "exactly one slot").
    pub queued_handover_target: Option<CellId>,
    /// Packets queued during HANDOVER_LEAVING once the forwarding buffer
    /// has been primed, so ordering with earlier-forwarded data holds.
    pub forwarding_buffer: VecDeque<(DrbId, Vec<u8>)>,
    pub pending_reconfiguration: bool,
    /// Non-contention RACH preamble reserved for this UE on admission as a
    /// handover target (spec §4.2: "allocates a preamble for non-contention
    /// RACH"); released back to the cell's allocator on teardown.
    pub preamble: Option<u8>,
    /// PRACH mask index paired with `preamble`, restricting which RACH
    /// occasion the incoming UE may answer on. Kept alive alongside the
    /// preamble through HANDOVER_JOINING rather than discarded once granted.
    pub prach_mask_index: Option<u8>,
    timer: Option<EventId>,
}

impl UeManager {
    /// Construct a UE-Manager in INITIAL_RANDOM_ACCESS, as created on RACH.
    pub fn new_on_rach(cell: CellId, rnti: Rnti) -> Self {
        Self {
            cell,
            rnti,
            imsi: None,
            state: UeState::InitialRandomAccess,
            is_mc: false,
            is_mc2: false,
            source_cell: None,
            source_rnti: None,
            peer_primary: None,
            peer_secondary: None,
            bearers: BearerTable::new(cell, rnti),
            remote_rlc: HashMap::new(),
            queued_handover_target: None,
            forwarding_buffer: VecDeque::new(),
            pending_reconfiguration: false,
            preamble: None,
            prach_mask_index: None,
            timer: None,
        }
    }

    /// Construct a UE-Manager in HANDOVER_JOINING, as created by an
    /// incoming X2 handover request at the target cell.
    pub fn new_on_handover_joining(
        cell: CellId,
        rnti: Rnti,
        imsi: Imsi,
        source_cell: CellId,
        source_rnti: Rnti,
    ) -> Self {
        let mut ue = Self::new_on_rach(cell, rnti);
        ue.imsi = Some(imsi);
        ue.state = UeState::HandoverJoining;
        ue.source_cell = Some(source_cell);
        ue.source_rnti = Some(source_rnti);
        ue
    }

    pub fn take_timer(&mut self) -> Option<EventId> {
        self.timer.take()
    }

    pub fn set_timer(&mut self, id: EventId) {
        self.timer = Some(id);
    }

    fn transition(&mut self, state: UeState) {
        log::debug!("cell={:?} rnti={:?} {:?} -> {:?}", self.cell, self.rnti, self.state, state);
        self.state = state;
    }

    /// spec §4.1: `setupDataRadioBearer`.
    pub fn setup_data_radio_bearer(&mut self, req: SetupBearerRequest) -> Result<(DrbId, Vec<Effect>)> {
        let drb_id = self.bearers.setup(req.eps_bearer_id, req.rlc)?;

        // If joining via handover, the incoming X2 TEID is recorded against
        // the freshly created bearer so S1-U user-plane forwarding can be
        // re-pointed once path switch completes.
        if self.state == UeState::HandoverJoining {
            // The transport TEID itself is tracked by the S1-U layer, out
            // of scope here (spec §1 non-goal); we only need to note that a
            // DRB now exists for this bearer.
            let _ = req.transport_teid;
        }

        self.pending_reconfiguration = true;
        Ok((drb_id, vec![]))
    }

    /// spec §4.1: `prepareHandover(targetCellId)`.
    pub fn prepare_handover(&mut self, target_cell: CellId) -> Vec<Effect> {
        match self.state {
            UeState::ConnectedNormally => {
                let imsi = self.imsi.expect("connected UE must have an IMSI");
                self.transition(UeState::HandoverPreparation);
                vec![Effect::SendX2 {
                    to: target_cell,
                    message: X2Message::HandoverRequest {
                        imsi,
                        source_cell: self.cell,
                        source_rnti: self.rnti,
                    },
                }]
            }
            UeState::ConnectionReconfiguration | UeState::HandoverJoining => {
                // Exactly one slot; a second call overwrites the pending
                // target (spec §4.1).
                self.queued_handover_target = Some(target_cell);
                vec![]
            }
            _ => vec![],
        }
    }

    /// spec §4.1: `recvHandoverRequestAck(params)`, on the source side.
    pub fn recv_handover_request_ack(
        &mut self,
        target_cell: CellId,
        target_rnti: Rnti,
        handover_leaving_timeout: Micros,
    ) -> Vec<Effect> {
        if self.state != UeState::HandoverPreparation {
            return vec![];
        }
        self.transition(UeState::HandoverLeaving);
        let imsi = self.imsi.expect("UE in handover must have an IMSI");

        let mut effects = vec![Effect::ArmTimer {
            kind: TimerKind::HandoverLeaving,
            delay: handover_leaving_timeout,
        }];

        // SN-Status-Transfer for every AM bearer, then forward buffers
        // (spec §4.1.1). Non-AM bearers have nothing to snapshot.
        for bearer in self.bearers.iter_mut() {
            if bearer.lte_rlc.kind == crate::rlc::RlcKind::Am {
                let forwarded = bearer.lte_rlc.forward(ForwardMode::Drain);
                effects.push(Effect::SendX2 {
                    to: target_cell,
                    message: X2Message::SnStatusTransfer {
                        imsi,
                        drb_id: bearer.drb_id,
                        forwarded: forwarded.clone(),
                    },
                });
                if !forwarded.is_empty() {
                    effects.push(Effect::SendX2 {
                        to: target_cell,
                        message: X2Message::ForwardRlcPdu {
                            imsi,
                            drb_id: bearer.drb_id,
                            sdus: forwarded,
                        },
                    });
                }
            } else {
                let forwarded = bearer.lte_rlc.forward(ForwardMode::Drain);
                if !forwarded.is_empty() {
                    effects.push(Effect::SendX2 {
                        to: target_cell,
                        message: X2Message::ForwardRlcPdu {
                            imsi,
                            drb_id: bearer.drb_id,
                            sdus: forwarded,
                        },
                    });
                }
            }
        }

        self.peer_primary = Some((target_cell, target_rnti));
        effects
    }

    /// spec §4.1: `recvRrcConnectionReconfigurationCompleted(msg)`, target
    /// side. `leg` distinguishes a primary handover (full S1 path switch)
    /// from a secondary-cell one (coordinator-notified only, spec S6).
    pub fn recv_rrc_connection_reconfiguration_completed(
        &mut self,
        leg: Option<Leg>,
    ) -> Vec<Effect> {
        if self.state != UeState::HandoverJoining {
            return vec![];
        }

        let imsi = self.imsi.expect("joining UE must have an IMSI");
        let mut effects = vec![];

        match leg {
            None => {
                self.transition(UeState::HandoverPathSwitch);
                // Path switch itself is driven by the S1apSap boundary; the
                // controller issues it once it sees this state.
                self.transition(UeState::ConnectedNormally);
            }
            Some(_) => {
                self.is_mc = true;
                self.transition(UeState::ConnectedNormally);
                if let Some(source_cell) = self.source_cell {
                    effects.push(Effect::SendX2 {
                        to: source_cell,
                        message: X2Message::SecondaryCellHandoverCompleted {
                            imsi,
                            target_cell: self.cell,
                        },
                    });
                }
            }
        }

        if let Some(target) = self.queued_handover_target.take() {
            effects.extend(self.prepare_handover(target));
        }

        effects
    }

    /// spec §4.1: `sendData(bid, packet)`.
    pub fn send_data(&mut self, drb_id: DrbId, packet: Vec<u8>) -> Result<Vec<Effect>> {
        match self.state {
            UeState::HandoverLeaving => {
                let target = self
                    .peer_primary
                    .ok_or(McRrcError::InconsistentMapping("handover-leaving UE has no target"))?;
                if self.forwarding_buffer.is_empty() {
                    let imsi = self.imsi.expect("UE must have an IMSI");
                    Ok(vec![Effect::SendX2 {
                        to: target.0,
                        message: X2Message::UeData {
                            imsi,
                            drb_id,
                            pdu: crate::pdcp::PdcpPdu { sn: 0, bytes: packet },
                        },
                    }])
                } else {
                    self.forwarding_buffer.push_back((drb_id, packet));
                    Ok(vec![])
                }
            }
            UeState::ConnectedNormally
            | UeState::ConnectionReconfiguration
            | UeState::PrepareMcConnectionReconfiguration
            | UeState::McConnectionReconfiguration => {
                let bearer = self.bearers.get_mut(drb_id)?;
                let routed = bearer.pdcp.transmit_pdcp_sdu(packet);
                let mut effects = vec![];
                let imsi = self.imsi.expect("UE must have an IMSI");
                for (path, pdu) in routed {
                    match path {
                        PdcpPath::LteLocal => {
                            bearer.lte_rlc.push_down(pdu.bytes);
                        }
                        PdcpPath::MmWaveA | PdcpPath::MmWaveB => {
                            if let Some(target) = bearer.pdcp.remote_target(path) {
                                effects.push(Effect::SendX2 {
                                    to: target.cell,
                                    message: X2Message::UeData { imsi, drb_id, pdu },
                                });
                            }
                        }
                    }
                }
                Ok(effects)
            }
            _ => Err(McRrcError::InvalidState("sendData outside a connected state")),
        }
    }

    /// spec §4.1.2: dual-connectivity secondary attach, anchor side. Marks
    /// every current DRB as MC-capable and emits one RlcSetupRequest per
    /// chosen mmWave cell.
    pub fn setup_split_bearers(&mut self, primary: CellId, secondary: Option<CellId>) -> Vec<Effect> {
        let imsi = self.imsi.expect("connected UE must have an IMSI");
        let mut effects = vec![];
        for bearer in self.bearers.iter_mut() {
            bearer.is_mc = true;
            bearer.is_mc_dual = secondary.is_some();
            effects.push(Effect::SendX2 {
                to: primary,
                message: X2Message::RlcSetupRequest {
                    imsi,
                    anchor_cell: self.cell,
                    anchor_rnti: self.rnti,
                    drb_id: bearer.drb_id,
                },
            });
            if let Some(secondary) = secondary {
                effects.push(Effect::SendX2 {
                    to: secondary,
                    message: X2Message::RlcSetupRequest {
                        imsi,
                        anchor_cell: self.cell,
                        anchor_rnti: self.rnti,
                        drb_id: bearer.drb_id,
                    },
                });
            }
        }
        self.transition(UeState::PrepareMcConnectionReconfiguration);
        effects
    }

    /// Both remote-RLC setups have completed; move to MC reconfiguration
    /// and then, once the UE ACKs, back to CONNECTED_NORMALLY (the ACK path
    /// is `recv_rrc_connection_reconfiguration_completed` with `leg` set).
    pub fn both_split_bearers_ready(&mut self) {
        if self.state == UeState::PrepareMcConnectionReconfiguration {
            self.transition(UeState::McConnectionReconfiguration);
        }
    }

    /// spec §4.1.3: connection switch LTE <-> mmWave, anchor side. Returns
    /// the affected DRB-IDs (for the `RrcConnectionSwitch` message to the
    /// UE, sent by the controller over the RRC/PHY boundary, out of scope
    /// here) together with any X2 forwarding this side needs to emit.
    pub fn switch_connection(&mut self, to_mmwave: bool) -> (Vec<DrbId>, Vec<Effect>) {
        let imsi = self.imsi.expect("connected UE must have an IMSI");
        let mut effects = vec![];
        let mut affected_drbs = vec![];

        for bearer in self.bearers.iter_mut() {
            if !bearer.is_mc {
                continue;
            }
            affected_drbs.push(bearer.drb_id);
            if to_mmwave {
                let path = bearer
                    .pdcp
                    .remote_target(PdcpPath::MmWaveA)
                    .map(|_| PdcpPath::MmWaveA)
                    .unwrap_or(PdcpPath::MmWaveB);
                bearer.pdcp.switch_connection(path);
                let forwarded = bearer.lte_rlc.forward(ForwardMode::Drain);
                if !forwarded.is_empty() {
                    if let Some(target) = bearer.pdcp.remote_target(path) {
                        effects.push(Effect::SendX2 {
                            to: target.cell,
                            message: X2Message::ForwardRlcPdu {
                                imsi,
                                drb_id: bearer.drb_id,
                                sdus: forwarded,
                            },
                        });
                    }
                }
            } else {
                bearer.pdcp.switch_connection(PdcpPath::LteLocal);
                // The mmWave cells push their RLC buffers back to us; we
                // cannot drain their entities from here, so we only signal
                // the switch. The controller is responsible for relaying a
                // ForwardRlcPdu back once each mmWave cell responds.
            }
        }
        (affected_drbs, effects)
    }

    /// Timer expiry handling (spec §7). `handover_joining_failure_grace_us`
    /// is the cell's configured grace period before a failed MC-leg join is
    /// torn down; only consulted for the HANDOVER_JOINING arm.
    pub fn on_timeout(&mut self, kind: TimerKind, handover_joining_failure_grace_us: Micros) -> Vec<Effect> {
        match (self.state, kind) {
            (UeState::InitialRandomAccess, TimerKind::ConnectionRequest)
            | (UeState::ConnectionSetup, TimerKind::ConnectionSetup)
            | (UeState::ConnectionRejected, TimerKind::ConnectionRejected) => vec![Effect::Destroy],
            (UeState::HandoverJoining, TimerKind::HandoverJoining) => {
                let mut effects = vec![];
                if self.is_mc || self.is_mc2 {
                    if let (Some(source_cell), Some(imsi)) = (self.source_cell, self.imsi) {
                        effects.push(Effect::SendX2 {
                            to: source_cell,
                            message: X2Message::HandoverPreparationFailure {
                                imsi,
                                target_cell: self.cell,
                            },
                        });
                    }
                }
                effects.push(Effect::DestroyAfter { delay: handover_joining_failure_grace_us });
                effects
            }
            (UeState::HandoverLeaving, TimerKind::HandoverLeaving) => vec![Effect::Destroy],
            _ => vec![],
        }
    }

    /// spec §7: `HandoverPreparationFailure` at the source.
    pub fn on_handover_preparation_failure(&mut self) {
        if self.state == UeState::HandoverPreparation {
            self.transition(UeState::ConnectedNormally);
        }
        // In HANDOVER_LEAVING this is deliberately ignored (spec §9(ii)):
        // the target never admitted the UE, but the source has already
        // committed to leaving.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rlc::RlcKind;

    fn connected_ue() -> UeManager {
        let mut ue = UeManager::new_on_rach(CellId(1), Rnti(10));
        ue.imsi = Some(Imsi(1));
        ue.state = UeState::ConnectedNormally;
        ue
    }

    #[test]
    fn prepare_handover_from_connected_emits_request_and_transitions() {
        let mut ue = connected_ue();
        let effects = ue.prepare_handover(CellId(2));
        assert_eq!(ue.state, UeState::HandoverPreparation);
        match &effects[0] {
            Effect::SendX2 { to, message: X2Message::HandoverRequest { imsi, .. } } => {
                assert_eq!(*to, CellId(2));
                assert_eq!(*imsi, Imsi(1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn prepare_handover_while_reconfiguring_is_queued_not_sent() {
        let mut ue = connected_ue();
        ue.state = UeState::ConnectionReconfiguration;
        let effects = ue.prepare_handover(CellId(2));
        assert!(effects.is_empty());
        assert_eq!(ue.queued_handover_target, Some(CellId(2)));

        // A second call overwrites the single slot.
        ue.prepare_handover(CellId(3));
        assert_eq!(ue.queued_handover_target, Some(CellId(3)));
    }

    #[test]
    fn setup_data_radio_bearer_allocates_drb_and_marks_reconfig_pending() {
        let mut ue = connected_ue();
        let (drb, effects) = ue
            .setup_data_radio_bearer(SetupBearerRequest {
                eps_bearer_id: EpsBearerId(5),
                transport_teid: Teid(1),
                rlc: RlcEntity::new(RlcKind::Am),
            })
            .unwrap();
        assert_eq!(drb.0, 1);
        assert!(effects.is_empty());
        assert!(ue.pending_reconfiguration);
    }

    #[test]
    fn timeout_in_initial_random_access_destroys() {
        let mut ue = UeManager::new_on_rach(CellId(1), Rnti(10));
        let effects = ue.on_timeout(TimerKind::ConnectionRequest, 300_000);
        assert_eq!(effects, vec![Effect::Destroy]);
    }

    #[test]
    fn handover_joining_timeout_on_mc_leg_notifies_source_then_grace_destroys() {
        let mut ue = UeManager::new_on_handover_joining(CellId(2), Rnti(20), Imsi(1), CellId(1), Rnti(10));
        ue.is_mc = true;
        let effects = ue.on_timeout(TimerKind::HandoverJoining, 300_000);
        assert_eq!(effects.len(), 2);
        assert!(matches!(
            effects[0],
            Effect::SendX2 { to: CellId(1), message: X2Message::HandoverPreparationFailure { .. } }
        ));
        assert_eq!(effects[1], Effect::DestroyAfter { delay: 300_000 });
    }

    #[test]
    fn secondary_handover_complete_notifies_coordinator_not_path_switch() {
        let mut ue = UeManager::new_on_handover_joining(CellId(2), Rnti(20), Imsi(1), CellId(1), Rnti(10));
        let effects = ue.recv_rrc_connection_reconfiguration_completed(Some(Leg::Primary));
        assert_eq!(ue.state, UeState::ConnectedNormally);
        assert!(ue.is_mc);
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            effects[0],
            Effect::SendX2 { to: CellId(1), message: X2Message::SecondaryCellHandoverCompleted { .. } }
        ));
    }

    #[test]
    fn deferred_handover_is_replayed_after_reconfiguration_completed() {
        let mut ue = UeManager::new_on_handover_joining(CellId(2), Rnti(20), Imsi(1), CellId(1), Rnti(10));
        ue.queued_handover_target = Some(CellId(9));
        let effects = ue.recv_rrc_connection_reconfiguration_completed(None);
        assert_eq!(ue.state, UeState::HandoverPreparation);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::SendX2 { to: CellId(9), .. })));
    }
}
