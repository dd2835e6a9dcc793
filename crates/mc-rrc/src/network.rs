//! Top-level orchestration: the literal single-threaded cooperative
//! scheduler spec §5 describes, wiring together the per-cell
//! [`RrcController`]s, the shared [`X2Bus`], the coordinator's
//! [`MeasurementAggregator`], and the [`EventQueue`] that drives simulated
//! time forward.
//!
//! Grounded on the teacher's `app/src/main.rs` main loop, which polls one
//! event source and dispatches by matching on event kind; generalized here
//! from one peripheral to many cells, with X2 delivery treated as
//! synchronous (spec §4.3 permits a best-effort bus implementation since
//! the higher-level state machine already guards races with
//! `mmWaveCellSetupCompleted`).

use std::collections::HashMap;

use crate::bearer::RemoteRlcInfo;
use crate::config::RrcConfig;
use crate::error::Result;
use crate::ids::{CellId, EpsBearerId, Imsi, Leg, Rnti};
use crate::mac_phy::{new_rlc_entity, LcInfo, MacControlSap, S1apSap};
use crate::measurement::MeasurementAggregator;
use crate::rrc_controller::{ControlEffect, Group, RrcController};
use crate::scheduler::{EventQueue, Instant};
use crate::ue_manager::{Effect, SetupBearerRequest, TimerKind, UeManager, UeState};
use crate::x2::X2Message;

#[derive(Debug, Clone, PartialEq)]
enum NetworkEvent {
    UeTimeout { cell: CellId, rnti: Rnti, kind: TimerKind },
    DestroyUe { cell: CellId, rnti: Rnti },
    HandoverFire { imsi: Imsi, leg: Leg },
    ControlTick,
    RetrySplitBearerSetup { imsi: Imsi },
}

pub struct Network {
    queue: EventQueue<NetworkEvent>,
    bus: crate::x2::X2Bus,
    agg: MeasurementAggregator,
    cells: HashMap<CellId, RrcController>,
    coordinator_cell: CellId,
    control_tick_scheduled: bool,
}

impl Network {
    pub fn new(coordinator_cell: CellId, coordinator_config: RrcConfig) -> Self {
        let outage_threshold = coordinator_config.outage_threshold_db;
        let mut cells = HashMap::new();
        cells.insert(
            coordinator_cell,
            RrcController::new(coordinator_cell, coordinator_config, true),
        );
        Self {
            queue: EventQueue::new(),
            bus: crate::x2::X2Bus::new(),
            agg: MeasurementAggregator::new(outage_threshold),
            cells,
            coordinator_cell,
            control_tick_scheduled: false,
        }
    }

    pub fn add_mmwave_cell(&mut self, cell: CellId, group: Group, config: RrcConfig) {
        self.cells.insert(cell, RrcController::new(cell, config, false));
        self.coordinator_mut().register_mmwave_cell(cell, group);
    }

    fn coordinator_mut(&mut self) -> &mut crate::rrc_controller::CoordinatorState {
        self.cells
            .get_mut(&self.coordinator_cell)
            .unwrap()
            .coordinator
            .as_mut()
            .unwrap()
    }

    pub fn now(&self) -> Instant {
        self.queue.now()
    }

    pub fn controller(&self, cell: CellId) -> Option<&RrcController> {
        self.cells.get(&cell)
    }

    pub fn controller_mut(&mut self, cell: CellId) -> Option<&mut RrcController> {
        self.cells.get_mut(&cell)
    }

    /// Start the coordinator's periodic control loop; idempotent.
    pub fn start_control_loop(&mut self) {
        if self.control_tick_scheduled {
            return;
        }
        self.control_tick_scheduled = true;
        self.queue.schedule(0, NetworkEvent::ControlTick);
    }

    /// Report an incoming SINR reading and let the coordinator's aggregator
    /// absorb it (spec §4.5).
    pub fn report_sinr(&mut self, imsi: Imsi, cell: CellId, sinr_db: f64) {
        self.agg.report(imsi, cell, sinr_db);
    }

    /// Drive simulated time forward to `until`, processing every due event
    /// along the way (timers, control-loop ticks, handover fires).
    pub fn run_until(&mut self, until: Instant) {
        while let Some((_, event)) = self.queue.pop_due(until) {
            self.handle_event(event);
        }
        self.queue.advance_to(until);
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::UeTimeout { cell, rnti, kind } => {
                if let Some(ctrl) = self.cells.get_mut(&cell) {
                    let grace = ctrl.config.handover_joining_failure_grace_us;
                    if let Ok(ue) = ctrl.ue(rnti) {
                        let effects = ue.on_timeout(kind, grace);
                        self.apply_effects(cell, rnti, effects);
                    }
                }
            }
            NetworkEvent::DestroyUe { cell, rnti } => {
                if let Some(ctrl) = self.cells.get_mut(&cell) {
                    ctrl.destroy_ue(rnti);
                }
            }
            NetworkEvent::HandoverFire { imsi, leg } => {
                let now = self.queue.now();
                self.fire_handover(imsi, leg, now);
            }
            NetworkEvent::ControlTick => {
                self.run_control_tick();
            }
            NetworkEvent::RetrySplitBearerSetup { imsi } => {
                self.try_setup_split_bearers(imsi);
            }
        }
    }

    /// Attempt dual-connectivity split-bearer setup for an already-connected
    /// UE (spec §4.1.2). If the coordinator's aggregator does not yet have a
    /// second-best mmWave cell for this IMSI, the attempt is deferred and
    /// retried at [`crate::measurement::SECONDARY_RETRY_INTERVAL_US`]
    /// granularity rather than proceeding with only a primary cell (spec
    /// §9(iii)).
    pub fn try_setup_split_bearers(&mut self, imsi: Imsi) {
        if let Some(delay) = self.agg.schedule_secondary_retry(imsi) {
            self.queue.schedule(delay, NetworkEvent::RetrySplitBearerSetup { imsi });
            return;
        }
        let ranked = self.agg.ranked(imsi);
        let Some((primary, _)) = ranked.best else {
            return;
        };
        let secondary = ranked.second_best.map(|(cell, _)| cell);

        let Ok(rnti) = self
            .cells
            .get_mut(&self.coordinator_cell)
            .unwrap()
            .ue_for_imsi(imsi)
            .map(|ue| ue.rnti)
        else {
            return;
        };
        let effects = {
            let ctrl = self.cells.get_mut(&self.coordinator_cell).unwrap();
            let ue = ctrl.ue(rnti).unwrap();
            ue.setup_split_bearers(primary, secondary)
        };
        self.apply_effects(self.coordinator_cell, rnti, effects);
    }

    fn run_control_tick(&mut self) {
        let period = self
            .cells
            .get(&self.coordinator_cell)
            .map(|c| c.config.crt_period_us)
            .unwrap_or(1_600);
        let now = self.queue.now();

        let effects = {
            let agg = &self.agg;
            let ctrl = self.cells.get_mut(&self.coordinator_cell).unwrap();
            ctrl.tick(agg, now).unwrap_or_default()
        };

        for effect in effects {
            self.apply_control_effect(effect);
        }

        self.queue.schedule(period, NetworkEvent::ControlTick);
    }

    fn apply_control_effect(&mut self, effect: ControlEffect) {
        match effect {
            ControlEffect::SwitchToLte { imsi } => self.switch_connection(imsi, false),
            ControlEffect::SwitchToMmWave { imsi } => self.switch_connection(imsi, true),
            ControlEffect::ScheduleHandoverFire { imsi, leg, at, .. } => {
                self.queue.schedule_at(at, NetworkEvent::HandoverFire { imsi, leg });
            }
            ControlEffect::CancelHandoverFire { .. } => {
                // Stale fires are already guarded by `mmWaveCellSetupCompleted`
                // and by the pending-handover table being re-checked at fire
                // time (spec §9: cancellation is idempotent, re-planning
                // simply lets the old event observe nothing to do).
            }
        }
    }

    fn switch_connection(&mut self, imsi: Imsi, to_mmwave: bool) {
        let Ok(rnti) = self
            .cells
            .get_mut(&self.coordinator_cell)
            .unwrap()
            .ue_for_imsi(imsi)
            .map(|ue| ue.rnti)
        else {
            return;
        };
        let (_, effects) = {
            let ctrl = self.cells.get_mut(&self.coordinator_cell).unwrap();
            let ue = ctrl.ue(rnti).unwrap();
            ue.switch_connection(to_mmwave)
        };
        self.apply_effects(self.coordinator_cell, rnti, effects);
    }

    /// spec §4.2 "Handover fire".
    fn fire_handover(&mut self, imsi: Imsi, leg: Leg, now: Instant) {
        let Some(target_cell) = self
            .cells
            .get_mut(&self.coordinator_cell)
            .unwrap()
            .fire_handover(imsi, leg, now)
        else {
            log::debug!("imsi={:?} leg={:?} handover fire observed nothing to do, skipping", imsi, leg);
            return;
        };
        log::debug!("imsi={:?} leg={:?} firing handover to cell={:?}", imsi, leg, target_cell);
        self.bus.send(
            self.coordinator_cell,
            target_cell,
            X2Message::McHandoverRequest {
                imsi,
                anchor_cell: self.coordinator_cell,
                anchor_rnti: Rnti::UNKNOWN,
                leg,
            },
        );
        self.pump_bus(self.coordinator_cell, target_cell);
    }

    /// Apply every [`Effect`] a UE-Manager operation returned: arm/cancel
    /// timers, send X2 messages (delivered synchronously), or tear the
    /// UE-Manager down.
    fn apply_effects(&mut self, cell: CellId, rnti: Rnti, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SendX2 { to, message } => {
                    self.bus.send(cell, to, message);
                    self.pump_bus(cell, to);
                }
                Effect::ArmTimer { kind, delay } => {
                    let old = self
                        .cells
                        .get_mut(&cell)
                        .and_then(|c| c.ue(rnti).ok())
                        .and_then(|u| u.take_timer());
                    if let Some(id) = old {
                        self.queue.cancel(id);
                    }
                    let id = self.queue.schedule(delay, NetworkEvent::UeTimeout { cell, rnti, kind });
                    if let Some(ue) = self.cells.get_mut(&cell).and_then(|c| c.ue(rnti).ok()) {
                        ue.set_timer(id);
                    }
                }
                Effect::Destroy => {
                    if let Some(ctrl) = self.cells.get_mut(&cell) {
                        ctrl.destroy_ue(rnti);
                    }
                }
                Effect::DestroyAfter { delay } => {
                    self.queue.schedule(delay, NetworkEvent::DestroyUe { cell, rnti });
                }
            }
        }
    }

    /// Drain and process every message currently queued from `from` to
    /// `to`, in FIFO order (spec §4.3).
    fn pump_bus(&mut self, from: CellId, to: CellId) {
        while let Some(message) = self.bus.pop(from, to) {
            self.dispatch_x2(from, to, message);
        }
    }

    fn dispatch_x2(&mut self, from: CellId, to: CellId, message: X2Message) {
        match message {
            X2Message::HandoverRequest { imsi, source_cell, source_rnti } => {
                let Some(ctrl) = self.cells.get_mut(&to) else { return };
                match ctrl.handle_incoming_handover_request(imsi, source_cell, source_rnti) {
                    Ok((target_rnti, effects)) => {
                        self.apply_effects(to, target_rnti, effects);
                        self.bus.send(
                            to,
                            from,
                            X2Message::HandoverRequestAck { imsi, target_cell: to, target_rnti },
                        );
                        self.pump_bus(to, from);
                    }
                    Err(_) => {
                        self.bus.send(to, from, X2Message::HandoverPreparationFailure { imsi, target_cell: to });
                        self.pump_bus(to, from);
                    }
                }
            }
            X2Message::HandoverRequestAck { imsi, target_cell, target_rnti } => {
                // This travels target -> source, so the UE-Manager it
                // concerns (the one sitting in HANDOVER_PREPARATION) lives
                // at `to`, not `from`.
                let Some(ctrl) = self.cells.get_mut(&to) else { return };
                if let Ok(source_rnti) = ctrl.ue_for_imsi(imsi).map(|u| u.rnti) {
                    let handover_leaving_timeout = ctrl.config.handover_leaving_timeout_us;
                    if let Ok(ue) = ctrl.ue(source_rnti) {
                        let effects = ue.recv_handover_request_ack(target_cell, target_rnti, handover_leaving_timeout);
                        self.apply_effects(to, source_rnti, effects);
                    }
                }
            }
            X2Message::HandoverPreparationFailure { imsi, .. } => {
                if let Some(ctrl) = self.cells.get_mut(&to) {
                    if let Ok(ue) = ctrl.ue_for_imsi(imsi) {
                        ue.on_handover_preparation_failure();
                    }
                }
            }
            X2Message::McHandoverRequest { imsi, anchor_cell, anchor_rnti, leg } => {
                let Some(ctrl) = self.cells.get_mut(&to) else { return };
                if let Ok((target_rnti, effects)) = ctrl.handle_incoming_handover_request(imsi, anchor_cell, anchor_rnti) {
                    if let Ok(ue) = ctrl.ue(target_rnti) {
                        match leg {
                            Leg::Primary => ue.is_mc = true,
                            Leg::Secondary => ue.is_mc2 = true,
                        }
                    }
                    self.apply_effects(to, target_rnti, effects);
                    self.bus.send(
                        to,
                        anchor_cell,
                        X2Message::HandoverRequestAck { imsi, target_cell: to, target_rnti },
                    );
                    self.pump_bus(to, anchor_cell);
                }
            }
            X2Message::SnStatusTransfer { .. } => {
                // SN-status snapshot itself is informational for a host
                // binary's tracing layer; the buffer it precedes arrives
                // via `ForwardRlcPdu`/`UeData` and is what actually primes
                // the target's queues.
            }
            X2Message::UeContextRelease { rnti, .. } => {
                if let Some(ctrl) = self.cells.get_mut(&to) {
                    ctrl.destroy_ue(rnti);
                }
            }
            X2Message::RlcSetupRequest { imsi, anchor_cell, anchor_rnti, drb_id } => {
                let Some(ctrl) = self.cells.get_mut(&to) else { return };
                let rlc = new_rlc_entity(&ctrl.config, 0.0);
                // The local RNTI a mmWave cell assigns its remote-RLC leg
                // would normally come out of the same allocator as a
                // regular attach; offsetting by DRB-ID here is a
                // simplification documented in the design ledger.
                let _ = ctrl.alloc_srs_index();
                let local_rnti = Rnti(1000 + drb_id.0 as u16);
                if let Some(coord_ue) = ctrl.ue_by_rnti.get_mut(&local_rnti) {
                    coord_ue.remote_rlc.insert(
                        drb_id,
                        RemoteRlcInfo {
                            anchor_cell,
                            anchor_rnti,
                            local_rnti,
                            drb_id,
                            lc_id: crate::ids::LcId(drb_id.0 + 2),
                            rlc,
                        },
                    );
                } else {
                    let mut placeholder = UeManager::new_on_rach(to, local_rnti);
                    placeholder.remote_rlc.insert(
                        drb_id,
                        RemoteRlcInfo {
                            anchor_cell,
                            anchor_rnti,
                            local_rnti,
                            drb_id,
                            lc_id: crate::ids::LcId(drb_id.0 + 2),
                            rlc,
                        },
                    );
                    ctrl.ue_by_rnti.insert(local_rnti, placeholder);
                }
                self.bus.send(
                    to,
                    anchor_cell,
                    X2Message::RlcSetupCompleted { imsi, drb_id, local_rnti },
                );
                self.pump_bus(to, anchor_cell);
            }
            X2Message::RlcSetupCompleted { .. } => {
                // The anchor's split-bearer setup tracking (both legs
                // reporting completion before issuing the MC
                // reconfiguration) is driven by the scenario/demo layer,
                // which knows how many legs it asked for.
            }
            X2Message::UeData { imsi, drb_id, pdu } => {
                if let Some(ctrl) = self.cells.get_mut(&to) {
                    if let Ok(ue) = ctrl.ue_for_imsi(imsi) {
                        if let Ok(bearer) = ue.bearers.get_mut(drb_id) {
                            bearer.lte_rlc.push_down(pdu.bytes);
                        }
                    }
                }
            }
            X2Message::ForwardRlcPdu { imsi, drb_id, sdus } => {
                if let Some(ctrl) = self.cells.get_mut(&to) {
                    if let Ok(ue) = ctrl.ue_for_imsi(imsi) {
                        if let Ok(bearer) = ue.bearers.get_mut(drb_id) {
                            bearer.lte_rlc.prime_with_forwarded(sdus);
                        }
                    }
                }
            }
            X2Message::SecondaryCellHandoverCompleted { imsi, target_cell } => {
                let coord = self.coordinator_mut();
                coord.mmwave_cell_setup_completed.insert(imsi, true);
                let _ = target_cell;
            }
            X2Message::UeSinrUpdate { imsi, cell, sinr_db } => {
                self.agg.report(imsi, cell, sinr_db);
            }
            X2Message::AssistantInformation { .. } => {
                // Buffer-occupancy/delay hint consumed by a split-bearer
                // scheduler; out of scope for this core (spec §1).
            }
            X2Message::NotifyLteMmWaveHandoverCompleted { imsi, .. } => {
                let coord = self.coordinator_mut();
                coord.mmwave_cell_setup_completed.insert(imsi, true);
            }
        }
    }

    pub fn setup_bearer(&mut self, cell: CellId, rnti: Rnti, req: SetupBearerRequest) -> Result<crate::ids::DrbId> {
        let eps_bearer_id = req.eps_bearer_id;
        let ctrl = self.controller_mut(cell).ok_or(crate::error::McRrcError::UnknownUe(cell, rnti))?;
        let ue = ctrl.ue(rnti)?;
        let (drb_id, effects) = ue.setup_data_radio_bearer(req)?;
        MacControlSap::add_logical_channel(
            ctrl,
            cell,
            LcInfo { rnti, lcid: crate::ids::LcId(drb_id.0 + 2), eps_bearer_id },
        );
        self.apply_effects(cell, rnti, effects);
        Ok(drb_id)
    }

    /// Deliver `RrcConnectionReconfigurationCompleted` to the UE sitting in
    /// HANDOVER_JOINING at `cell`/`rnti` (spec §4.1). For a primary handover
    /// this also drives the S1-AP path switch and releases the UE-Manager
    /// left behind at the source cell; a secondary-leg completion only
    /// notifies the coordinator (already handled inside the UE-Manager) and
    /// must not tear down the anchor's own primary UE.
    pub fn complete_handover(&mut self, cell: CellId, rnti: Rnti) {
        let Some((leg, imsi, source_cell, source_rnti, bearer_ids, effects)) = (|| {
            let ctrl = self.cells.get_mut(&cell)?;
            let ue = ctrl.ue(rnti).ok()?;
            if ue.state != UeState::HandoverJoining {
                return None;
            }
            let leg = if ue.is_mc {
                Some(Leg::Primary)
            } else if ue.is_mc2 {
                Some(Leg::Secondary)
            } else {
                None
            };
            let imsi = ue.imsi;
            let source_cell = ue.source_cell;
            let source_rnti = ue.source_rnti;
            let bearer_ids: Vec<EpsBearerId> = ue.bearers.iter().map(|b| b.eps_bearer_id).collect();
            let effects = ue.recv_rrc_connection_reconfiguration_completed(leg);
            Some((leg, imsi, source_cell, source_rnti, bearer_ids, effects))
        })() else {
            return;
        };

        self.apply_effects(cell, rnti, effects);

        if leg.is_none() {
            if let Some(imsi) = imsi {
                if let Some(ctrl) = self.cells.get_mut(&cell) {
                    S1apSap::path_switch_request(ctrl, rnti, cell, imsi, bearer_ids);
                }
                if let (Some(source_cell), Some(source_rnti)) = (source_cell, source_rnti) {
                    self.bus.send(cell, source_cell, X2Message::UeContextRelease { imsi, rnti: source_rnti });
                    self.pump_bus(cell, source_cell);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecondaryCellHandoverMode;
    use crate::ids::DrbId;

    fn two_mmwave_network() -> Network {
        let mut cfg = RrcConfig::default();
        cfg.secondary_cell_handover_mode = SecondaryCellHandoverMode::DynamicTtt;
        let mut net = Network::new(CellId(1), cfg.clone());
        net.add_mmwave_cell(CellId(2), Group::A, cfg.clone());
        net.add_mmwave_cell(CellId(3), Group::B, cfg);
        net
    }

    #[test]
    fn control_loop_schedules_handover_to_a_stronger_cell() {
        let mut net = two_mmwave_network();
        net.add_mmwave_cell(CellId(4), Group::A, RrcConfig::default());

        // Seed coordinator state as if the UE had already been on cell 2.
        {
            let coord = net.coordinator_mut();
            coord.mmwave_cell_setup_completed.insert(Imsi(1), true);
            coord.last_mmwave_cell.insert(Imsi(1), CellId(2));
            coord.imsi_using_lte.insert(Imsi(1), false);
        }
        net.report_sinr(Imsi(1), CellId(2), 5.0);
        net.report_sinr(Imsi(1), CellId(4), 20.0);

        net.start_control_loop();
        net.run_until(200_000);

        let coord = net.controller(CellId(1)).unwrap().coordinator.as_ref().unwrap();
        assert_eq!(coord.last_mmwave_cell.get(&Imsi(1)), Some(&CellId(4)));
    }

    #[test]
    fn destroy_after_releases_rnti() {
        let mut net = Network::new(CellId(1), RrcConfig::default());
        let rnti = net.controller_mut(CellId(1)).unwrap().handle_rach().unwrap();
        net.apply_effects(CellId(1), rnti, vec![Effect::DestroyAfter { delay: 1_000 }]);
        assert!(net.controller_mut(CellId(1)).unwrap().ue(rnti).is_ok());
        net.run_until(1_000);
        assert!(net.controller_mut(CellId(1)).unwrap().ue(rnti).is_err());
    }

    #[test]
    fn setup_bearer_allocates_a_drb() {
        let mut net = Network::new(CellId(1), RrcConfig::default());
        let rnti = net.controller_mut(CellId(1)).unwrap().handle_rach().unwrap();
        net.controller_mut(CellId(1)).unwrap().handle_connection_request(rnti, Imsi(1)).unwrap();
        net.controller_mut(CellId(1)).unwrap().handle_connection_setup_complete(rnti).unwrap();

        let cfg = RrcConfig::default();
        let drb = net
            .setup_bearer(
                CellId(1),
                rnti,
                SetupBearerRequest {
                    eps_bearer_id: crate::ids::EpsBearerId(5),
                    transport_teid: crate::ids::Teid(1),
                    rlc: new_rlc_entity(&cfg, 0.0),
                },
            )
            .unwrap();
        assert_eq!(drb, DrbId(1));
    }

    #[test]
    fn split_bearer_setup_retries_until_a_second_cell_is_known() {
        use crate::ue_manager::UeState;

        let mut net = two_mmwave_network();
        let rnti = net.controller_mut(CellId(1)).unwrap().handle_rach().unwrap();
        net.controller_mut(CellId(1)).unwrap().handle_connection_request(rnti, Imsi(1)).unwrap();
        net.controller_mut(CellId(1)).unwrap().handle_connection_setup_complete(rnti).unwrap();

        // Only the primary cell's SINR has been reported so far.
        net.report_sinr(Imsi(1), CellId(2), 15.0);
        net.try_setup_split_bearers(Imsi(1));
        assert_eq!(
            net.controller_mut(CellId(1)).unwrap().ue(rnti).unwrap().state,
            UeState::ConnectedNormally
        );

        // The retry is scheduled; let it fire once the second cell is known.
        net.report_sinr(Imsi(1), CellId(3), 10.0);
        net.run_until(crate::measurement::SECONDARY_RETRY_INTERVAL_US);

        assert_eq!(
            net.controller_mut(CellId(1)).unwrap().ue(rnti).unwrap().state,
            UeState::PrepareMcConnectionReconfiguration
        );
    }

    #[test]
    fn primary_handover_completion_emits_path_switch_and_releases_source() {
        let mut net = Network::new(CellId(1), RrcConfig::default());
        net.add_mmwave_cell(CellId(2), Group::A, RrcConfig::default());

        let rnti = net.controller_mut(CellId(1)).unwrap().handle_rach().unwrap();
        net.controller_mut(CellId(1)).unwrap().handle_connection_request(rnti, Imsi(1)).unwrap();
        net.controller_mut(CellId(1)).unwrap().handle_connection_setup_complete(rnti).unwrap();

        let effects = net.controller_mut(CellId(1)).unwrap().ue(rnti).unwrap().prepare_handover(CellId(2));
        net.apply_effects(CellId(1), rnti, effects);

        assert_eq!(net.controller_mut(CellId(1)).unwrap().ue(rnti).unwrap().state, UeState::HandoverLeaving);

        let target_rnti = *net.controller(CellId(2)).unwrap().imsi_to_rnti.get(&Imsi(1)).unwrap();
        net.complete_handover(CellId(2), target_rnti);

        assert!(net.controller_mut(CellId(1)).unwrap().ue(rnti).is_err());
        assert_eq!(
            net.controller_mut(CellId(2)).unwrap().ue(target_rnti).unwrap().state,
            UeState::ConnectedNormally
        );
    }
}
