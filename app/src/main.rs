//! Demo scenario binary: one LTE anchor cell and two mmWave cells serving a
//! single multi-connectivity UE, scripted through the initial attach and a
//! SINR-driven secondary handover. Stands in for the teacher's BLE demo
//! `main` (`app/src/main.rs` in the original `embassy_ipcc_extension`): a
//! small wiring harness that drives the library and logs what happens.

use log::info;

use mc_rrc::config::{RrcConfig, SecondaryCellHandoverMode};
use mc_rrc::ids::{CellId, Imsi};
use mc_rrc::rrc_controller::Group;
use mc_rrc::Network;

const LTE_CELL: CellId = CellId(1);
const CELL_A: CellId = CellId(2);
const CELL_B: CellId = CellId(3);
const CELL_A_PRIME: CellId = CellId(4);
const UE: Imsi = Imsi(1);

fn main() {
    env_logger::init();

    let mut config = RrcConfig::default();
    config.secondary_cell_handover_mode = SecondaryCellHandoverMode::DynamicTtt;
    config.min_dyn_ttt_value_us = 25_000;
    config.max_dyn_ttt_value_us = 150_000;
    config.min_diff_ttt_value_db = 3.0;
    config.max_diff_ttt_value_db = 20.0;

    let mut net = Network::new(LTE_CELL, config);
    net.add_mmwave_cell(CELL_A, Group::A, RrcConfig::default());
    net.add_mmwave_cell(CELL_B, Group::B, RrcConfig::default());
    net.add_mmwave_cell(CELL_A_PRIME, Group::A, RrcConfig::default());

    info!("attaching imsi=1 to the LTE anchor");
    let rnti = net.controller_mut(LTE_CELL).unwrap().handle_rach().unwrap();
    net.controller_mut(LTE_CELL)
        .unwrap()
        .handle_connection_request(rnti, UE)
        .unwrap();
    net.controller_mut(LTE_CELL)
        .unwrap()
        .handle_connection_setup_complete(rnti)
        .unwrap();

    info!("seeding initial SINR matrix: A=20dB B=18dB");
    net.report_sinr(UE, CELL_A, 20.0);
    net.report_sinr(UE, CELL_B, 18.0);

    {
        let coord = net.controller_mut(LTE_CELL).unwrap().coordinator.as_mut().unwrap();
        coord.mmwave_cell_setup_completed.insert(UE, true);
        coord.last_mmwave_cell.insert(UE, CELL_A);
        coord.last_mmwave_cell2.insert(UE, CELL_B);
        coord.imsi_using_lte.insert(UE, false);
    }

    net.start_control_loop();
    net.run_until(10_000);

    info!("cell A degrades to 5dB, A' appears at 20dB: TTT-based secondary handover should fire near t=61ms");
    net.report_sinr(UE, CELL_A, 5.0);
    net.report_sinr(UE, CELL_A_PRIME, 20.0);
    net.run_until(120_000);

    let coord = net.controller(LTE_CELL).unwrap().coordinator.as_ref().unwrap();
    info!(
        "final state: lastMmWaveCell={:?} lastMmWaveCell2={:?} mmWaveCellSetupCompleted={:?}",
        coord.last_mmwave_cell.get(&UE),
        coord.last_mmwave_cell2.get(&UE),
        coord.mmwave_cell_setup_completed.get(&UE),
    );
}
