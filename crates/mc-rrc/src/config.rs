//! Configuration surface. Option names follow spec §6 verbatim so that a
//! reader cross-referencing the spec table finds the same identifiers here.
//!
//! Modeled as a plain struct of named fields with a [`Default`] impl, the
//! same shape the teacher uses for `ShciBleInitCmdParam` (a `Copy` struct of
//! radio-stack parameters passed in at init time) and that `cc90202-picoweb`
//! uses for its `configuration` module — generalized here with `serde`
//! derives so a scenario file can be deserialized by the simulation binary.

use serde::{Deserialize, Serialize};

/// RLC-kind selection policy for [`crate::rlc::rlc_kind_for_bearer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpsBearerToRlcMapping {
    RlcSmAlways,
    RlcUmAlways,
    RlcAmAlways,
    /// UM when packet-error-loss-rate > 1e-5, AM otherwise.
    PerBased,
    RlcUmLowlatAlways,
}

/// TTT computation mode for the coordinator's handover control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondaryCellHandoverMode {
    FixedTtt,
    DynamicTtt,
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcConfig {
    /// Initial PHY TX mode for new UEs.
    pub default_transmission_mode: u8,
    /// RLC-kind policy.
    pub eps_bearer_to_rlc_mapping: EpsBearerToRlcMapping,
    /// SIB broadcast interval, in microseconds.
    pub system_information_periodicity_us: u64,

    pub connection_request_timeout_us: u64,
    pub connection_setup_timeout_us: u64,
    pub connection_rejected_timeout_us: u64,
    pub handover_joining_timeout_us: u64,
    pub handover_leaving_timeout_us: u64,
    /// Grace period before a UE-Manager is destroyed after a
    /// `HANDOVER_JOINING` timeout is reported to the coordinator (spec §7).
    pub handover_joining_failure_grace_us: u64,

    /// dB below which mmWave is considered unusable.
    pub outage_threshold_db: f64,
    pub admit_handover_request: bool,
    pub admit_rrc_connection_request: bool,
    pub mm_wave_device: bool,
    pub inter_rat_ho_mode: bool,
    /// dB; minimum SINR gap required to retarget an in-flight handover.
    pub sinr_threshold_difference_db: f64,

    pub secondary_cell_handover_mode: SecondaryCellHandoverMode,
    pub fixed_ttt_value_us: u64,
    pub min_dyn_ttt_value_us: u64,
    pub max_dyn_ttt_value_us: u64,
    pub min_diff_ttt_value_db: f64,
    pub max_diff_ttt_value_db: f64,

    /// Control-loop period, in microseconds.
    pub crt_period_us: u64,
    /// SRS periodicity, one of {2,5,10,20,40,80,160,320} ms.
    pub srs_periodicity_ms: u16,
    /// SIB1 cell-selection floor, in \[-70, -22\].
    pub q_rx_lev_min: i8,

    /// Granularity of the secondary-cell-unknown retry timer (spec §9(iii)).
    pub secondary_cell_retry_us: u64,
}

impl Default for RrcConfig {
    fn default() -> Self {
        Self {
            default_transmission_mode: 0,
            eps_bearer_to_rlc_mapping: EpsBearerToRlcMapping::PerBased,
            system_information_periodicity_us: 80_000,

            connection_request_timeout_us: 10_000_000,
            connection_setup_timeout_us: 150_000,
            connection_rejected_timeout_us: 30_000,
            handover_joining_timeout_us: 200_000,
            handover_leaving_timeout_us: 200_000,
            handover_joining_failure_grace_us: 300_000,

            outage_threshold_db: 0.0,
            admit_handover_request: true,
            admit_rrc_connection_request: true,
            mm_wave_device: false,
            inter_rat_ho_mode: false,
            sinr_threshold_difference_db: 3.0,

            secondary_cell_handover_mode: SecondaryCellHandoverMode::DynamicTtt,
            fixed_ttt_value_us: 110_000,
            min_dyn_ttt_value_us: 25_000,
            max_dyn_ttt_value_us: 150_000,
            min_diff_ttt_value_db: 3.0,
            max_diff_ttt_value_db: 20.0,

            crt_period_us: 1_600,
            srs_periodicity_ms: 20,
            q_rx_lev_min: -70,

            secondary_cell_retry_us: 1_000,
        }
    }
}

/// See spec §8, testable property 8: boundary + interpolation + clamping,
/// never negative, truncated like the original's `uint8_t` cast
/// (`examples/original_source/src/lte/model/lte-enb-rrc.cc`,
/// `LteEnbRrc::ComputeTtt`).
pub fn compute_ttt(cfg: &RrcConfig, sinr_difference_db: f64) -> u64 {
    match cfg.secondary_cell_handover_mode {
        SecondaryCellHandoverMode::FixedTtt => cfg.fixed_ttt_value_us,
        SecondaryCellHandoverMode::Threshold => {
            if sinr_difference_db > cfg.sinr_threshold_difference_db {
                0
            } else {
                cfg.fixed_ttt_value_us
            }
        }
        SecondaryCellHandoverMode::DynamicTtt => {
            if sinr_difference_db < cfg.min_diff_ttt_value_db {
                cfg.max_dyn_ttt_value_us
            } else if sinr_difference_db > cfg.max_diff_ttt_value_db {
                cfg.min_dyn_ttt_value_us
            } else {
                // The original interpolates and truncates in whole
                // milliseconds (`uint8_t` cast), then the result is used as
                // a millisecond timer duration; we keep the same rounding
                // behavior and only convert to microseconds afterwards, so
                // that a 15dB gap with the default bounds truncates to 61ms
                // rather than carrying fractional microseconds through.
                let max_ms = cfg.max_dyn_ttt_value_us as f64 / 1000.0;
                let min_ms = cfg.min_dyn_ttt_value_us as f64 / 1000.0;
                let ttt_ms = max_ms
                    - (max_ms - min_ms) * (sinr_difference_db - cfg.min_diff_ttt_value_db)
                        / (cfg.max_diff_ttt_value_db - cfg.min_diff_ttt_value_db);
                debug_assert!(ttt_ms >= 0.0, "negative TTT");
                (ttt_ms.max(0.0) as u64).saturating_mul(1000)
            }
        }
    }
}
