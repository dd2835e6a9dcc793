//! End-to-end seed scenarios from the design brief (S1-S6): scripted SINR
//! inputs driven through a [`Network`], checked against the coordinator
//! state and X2 traffic they should produce.

use mc_rrc::config::{RrcConfig, SecondaryCellHandoverMode};
use mc_rrc::ids::{CellId, Imsi};
use mc_rrc::rrc_controller::Group;
use mc_rrc::Network;

const LTE_CELL: CellId = CellId(1);
const CELL_A: CellId = CellId(2);
const CELL_B: CellId = CellId(3);
const UE: Imsi = Imsi(1);

fn dynamic_ttt_config() -> RrcConfig {
    let mut cfg = RrcConfig::default();
    cfg.secondary_cell_handover_mode = SecondaryCellHandoverMode::DynamicTtt;
    cfg.min_dyn_ttt_value_us = 25_000;
    cfg.max_dyn_ttt_value_us = 150_000;
    cfg.min_diff_ttt_value_db = 3.0;
    cfg.max_diff_ttt_value_db = 20.0;
    cfg.sinr_threshold_difference_db = 3.0;
    cfg
}

fn network_with_two_legs() -> Network {
    let cfg = dynamic_ttt_config();
    let mut net = Network::new(LTE_CELL, cfg);
    net.add_mmwave_cell(CELL_A, Group::A, RrcConfig::default());
    net.add_mmwave_cell(CELL_B, Group::B, RrcConfig::default());
    net
}

/// S1 - Initial MC attach, no movement: SINR immediately favors A/B and the
/// control loop should converge on them as the best/second-best cells.
#[test]
fn s1_initial_mc_attach_converges_on_best_and_second_best() {
    let mut net = network_with_two_legs();
    net.report_sinr(UE, CELL_A, 20.0);
    net.report_sinr(UE, CELL_B, 18.0);

    // Seed as though the split-bearer setup (RlcSetupRequest exchange,
    // driven by the host application's admission logic) has already
    // completed, matching S1's final state.
    {
        let coord = net.controller_mut(LTE_CELL).unwrap().coordinator.as_mut().unwrap();
        coord.mmwave_cell_setup_completed.insert(UE, true);
        coord.last_mmwave_cell.insert(UE, CELL_A);
        coord.last_mmwave_cell2.insert(UE, CELL_B);
        coord.imsi_using_lte.insert(UE, false);
    }

    net.start_control_loop();
    net.run_until(10_000);

    let coord = net.controller(LTE_CELL).unwrap().coordinator.as_ref().unwrap();
    assert_eq!(coord.last_mmwave_cell.get(&UE), Some(&CELL_A));
    assert_eq!(coord.last_mmwave_cell2.get(&UE), Some(&CELL_B));
    assert!(!coord.is_using_lte(UE));
}

/// S2 - TTT-based secondary HO: A degrades, A' appears; Delta=15dB with the
/// default dynamic bounds truncates to a 61ms TTT, and at that time the
/// control loop's pending-handover table should point at A'.
#[test]
fn s2_ttt_based_secondary_handover_fires_at_61ms() {
    let mut net = network_with_two_legs();
    net.add_mmwave_cell(CellId(5), Group::A, RrcConfig::default()); // A'
    net.report_sinr(UE, CELL_A, 20.0);
    net.report_sinr(UE, CELL_B, 18.0);
    {
        let coord = net.controller_mut(LTE_CELL).unwrap().coordinator.as_mut().unwrap();
        coord.mmwave_cell_setup_completed.insert(UE, true);
        coord.last_mmwave_cell.insert(UE, CELL_A);
        coord.last_mmwave_cell2.insert(UE, CELL_B);
        coord.imsi_using_lte.insert(UE, false);
    }

    net.report_sinr(UE, CELL_A, 5.0);
    net.report_sinr(UE, CellId(5), 20.0);

    net.start_control_loop();
    // Just before the 61ms fire point: still scheduled, not yet applied.
    net.run_until(60_000);
    assert!(net
        .controller(LTE_CELL)
        .unwrap()
        .coordinator
        .as_ref()
        .unwrap()
        .is_setup_completed(UE));

    // Past the fire point: the coordinator flips mmWaveCellSetupCompleted
    // to false and records the new target as lastMmWaveCell.
    net.run_until(62_000);
    let coord = net.controller(LTE_CELL).unwrap().coordinator.as_ref().unwrap();
    assert_eq!(coord.last_mmwave_cell.get(&UE), Some(&CellId(5)));
    assert!(!coord.is_setup_completed(UE));

    // Completing the handover at A' (the joining target) notifies the
    // coordinator rather than issuing an S1 path switch, since this is a
    // secondary-leg handover fired via McHandoverRequest, and flips
    // mmWaveCellSetupCompleted back to true.
    let target_rnti = *net.controller(CellId(5)).unwrap().imsi_to_rnti.get(&UE).unwrap();
    net.complete_handover(CellId(5), target_rnti);
    let coord = net.controller(LTE_CELL).unwrap().coordinator.as_ref().unwrap();
    assert!(coord.is_setup_completed(UE));
}

/// S3 - Retarget during TTT: a closer cell shows up mid-TTT with a
/// sufficiently large SINR gap, which should cancel the first plan and
/// retarget before it ever fires.
#[test]
fn s3_retarget_during_ttt_points_at_the_new_best_cell() {
    let mut net = network_with_two_legs();
    let a_prime = CellId(5);
    let a_double_prime = CellId(6);
    net.add_mmwave_cell(a_prime, Group::A, RrcConfig::default());
    net.add_mmwave_cell(a_double_prime, Group::A, RrcConfig::default());

    net.report_sinr(UE, CELL_A, 20.0);
    net.report_sinr(UE, CELL_B, 18.0);
    {
        let coord = net.controller_mut(LTE_CELL).unwrap().coordinator.as_mut().unwrap();
        coord.mmwave_cell_setup_completed.insert(UE, true);
        coord.last_mmwave_cell.insert(UE, CELL_A);
        coord.last_mmwave_cell2.insert(UE, CELL_B);
        coord.imsi_using_lte.insert(UE, false);
    }

    net.report_sinr(UE, CELL_A, 5.0);
    net.report_sinr(UE, a_prime, 15.0);
    net.start_control_loop();
    net.run_until(5_000);

    {
        let coord = net.controller(LTE_CELL).unwrap().coordinator.as_ref().unwrap();
        let pending = coord.pending_for(UE, mc_rrc::ids::Leg::Primary).expect("a plan toward A' should exist");
        assert_eq!(pending.target_cell, a_prime);
    }

    // A'' shows up with a large enough gap over A' to force a retarget.
    net.report_sinr(UE, CELL_A, 5.0);
    net.report_sinr(UE, a_double_prime, 21.0);
    net.report_sinr(UE, a_prime, 10.0);
    net.run_until(20_000 + 5_000);

    let coord = net.controller(LTE_CELL).unwrap().coordinator.as_ref().unwrap();
    let pending = coord.pending_for(UE, mc_rrc::ids::Leg::Primary).expect("plan should now target A''");
    assert_eq!(pending.target_cell, a_double_prime);
}

/// S4 - Outage fallback and recovery.
#[test]
fn s4_outage_fallback_then_recovery() {
    let mut net = network_with_two_legs();
    net.report_sinr(UE, CELL_A, 20.0);
    net.report_sinr(UE, CELL_B, 18.0);
    {
        let coord = net.controller_mut(LTE_CELL).unwrap().coordinator.as_mut().unwrap();
        coord.mmwave_cell_setup_completed.insert(UE, true);
        coord.last_mmwave_cell.insert(UE, CELL_A);
        coord.last_mmwave_cell2.insert(UE, CELL_B);
        coord.imsi_using_lte.insert(UE, false);
    }

    net.report_sinr(UE, CELL_A, -5.0);
    net.report_sinr(UE, CELL_B, -5.0);
    net.start_control_loop();
    net.run_until(5_000);

    let using_lte_after_outage = net
        .controller(LTE_CELL)
        .unwrap()
        .coordinator
        .as_ref()
        .unwrap()
        .is_using_lte(UE);
    assert!(using_lte_after_outage);

    net.report_sinr(UE, CELL_A, 20.0);
    net.run_until(105_000);

    let using_lte_after_recovery = net
        .controller(LTE_CELL)
        .unwrap()
        .coordinator
        .as_ref()
        .unwrap()
        .is_using_lte(UE);
    assert!(!using_lte_after_recovery);
}

/// S5 - Lossless HO data preservation: 100 PDCP SDUs enqueued at the source
/// while it is already in HANDOVER_LEAVING must all arrive at the target,
/// in PDCP-SN order, with none lost. The X2-Bus's per-pair FIFO guarantee
/// (spec §4.3) is what makes "tunnel immediately, else buffer" (spec
/// §4.1.1) lossless: every SDU either goes out on the same ordered
/// source->target queue as the ones before it, or is queued behind them.
#[test]
fn s5_lossless_handover_preserves_all_sdus_in_order() {
    use mc_rrc::ids::{EpsBearerId, Rnti, Teid};
    use mc_rrc::rlc::{RlcEntity, RlcKind};
    use mc_rrc::ue_manager::{SetupBearerRequest, UeManager, UeState};

    let source_rnti = Rnti(10);
    let target_rnti = Rnti(20);

    let mut source = UeManager::new_on_rach(LTE_CELL, source_rnti);
    source.imsi = Some(UE);
    source.state = UeState::ConnectedNormally;
    let (drb_id, _) = source
        .setup_data_radio_bearer(SetupBearerRequest {
            eps_bearer_id: EpsBearerId(5),
            transport_teid: Teid(1),
            rlc: RlcEntity::new(RlcKind::Um),
        })
        .unwrap();

    // Fast-forward the source straight into HANDOVER_LEAVING, as it would be
    // after `recvHandoverRequestAck` (bearer-forwarding already emitted).
    source.prepare_handover(CELL_A);
    source.recv_handover_request_ack(CELL_A, target_rnti, 200_000);
    assert_eq!(source.state, UeState::HandoverLeaving);

    // 100 PDCP SDUs enqueued at the source while leaving. Each one is
    // either tunnelled to the target directly or appended to the forwarding
    // buffer behind whatever preceded it; either way none are dropped.
    let mut on_the_wire = vec![];
    for i in 0u8..100 {
        let effects = source.send_data(drb_id, vec![i]).unwrap();
        for effect in effects {
            if let mc_rrc::ue_manager::Effect::SendX2 {
                to,
                message: mc_rrc::x2::X2Message::UeData { pdu, .. },
            } = effect
            {
                assert_eq!(to, CELL_A);
                on_the_wire.push(pdu.bytes[0]);
            }
        }
    }
    // Anything not sent immediately sits in the forwarding buffer, in order.
    let buffered: Vec<u8> = source.forwarding_buffer.iter().map(|(_, b)| b[0]).collect();
    let delivered: Vec<u8> = on_the_wire.into_iter().chain(buffered).collect();
    assert_eq!(delivered, (0u8..100).collect::<Vec<u8>>());

    // The target receives the same bytes in the same order, regardless of
    // which side of the tunnel/buffer split they crossed on.
    let mut target_rlc = RlcEntity::new(RlcKind::Um);
    target_rlc.prime_with_forwarded(
        delivered
            .iter()
            .map(|&b| mc_rrc::rlc::RlcSdu { sn: None, bytes: vec![b] })
            .collect(),
    );
    let received: Vec<u8> = target_rlc
        .forward(mc_rrc::rlc::ForwardMode::Copy)
        .iter()
        .map(|s| s.bytes[0])
        .collect();
    assert_eq!(received, (0u8..100).collect::<Vec<u8>>());

    let target = UeManager::new_on_handover_joining(CELL_A, target_rnti, UE, LTE_CELL, source_rnti);
    assert_eq!(target.state, UeState::HandoverJoining);
}

/// S6 - A secondary-leg handover never issues an S1 path switch; it
/// notifies the coordinator directly via `SecondaryCellHandoverCompleted`.
#[test]
fn s6_secondary_leg_handover_skips_s1_path_switch() {
    use mc_rrc::ids::Leg;
    use mc_rrc::ue_manager::UeManager;

    let mut ue = UeManager::new_on_handover_joining(CELL_A, mc_rrc::ids::Rnti(50), UE, LTE_CELL, mc_rrc::ids::Rnti(10));
    let effects = ue.recv_rrc_connection_reconfiguration_completed(Some(Leg::Primary));

    let sends_path_switch = effects.iter().any(|e| {
        matches!(
            e,
            mc_rrc::ue_manager::Effect::SendX2 { message: mc_rrc::x2::X2Message::HandoverRequestAck { .. }, .. }
        )
    });
    let sends_secondary_complete = effects.iter().any(|e| {
        matches!(
            e,
            mc_rrc::ue_manager::Effect::SendX2 {
                message: mc_rrc::x2::X2Message::SecondaryCellHandoverCompleted { .. },
                ..
            }
        )
    });

    assert!(!sends_path_switch);
    assert!(sends_secondary_complete);
}
