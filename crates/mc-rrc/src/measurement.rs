//! Measurement-Aggregator: the global IMSI -> CellId -> SINR matrix feeding
//! the RRC-Controller's handover decisions, plus outage classification and
//! the secondary-cell-unknown retry timer.
//!
//! Grounded on the teacher's `Ble` signal bookkeeping (a small table kept
//! current by periodic reports, read back by a decision loop elsewhere)
//! generalized from one peer to the full per-UE cell SINR matrix spec §4.4
//! describes, and on `timer_interrupts::TimerList` for the retry timer.

use std::collections::HashMap;

use crate::ids::{CellId, Imsi};
use crate::scheduler::Micros;

/// Retry granularity for split-bearer setup while the secondary cell is
/// still unknown (spec §9(iii): "a dedicated retry timer at 1 ms
/// granularity").
pub const SECONDARY_RETRY_INTERVAL_US: Micros = 1_000;

/// One UE's best and second-best mmWave cells by last-reported SINR, plus
/// whether the serving (best) cell is currently in outage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCells {
    pub best: Option<(CellId, f64)>,
    pub second_best: Option<(CellId, f64)>,
}

/// Tracks every UE's per-cell SINR reports and derives the best/second-best
/// ranking the coordinator needs for handover and outage decisions (spec
/// §4.4).
#[derive(Default)]
pub struct MeasurementAggregator {
    /// imsi -> cell -> last reported SINR, dB.
    matrix: HashMap<Imsi, HashMap<CellId, f64>>,
    outage_threshold_db: f64,
}

impl MeasurementAggregator {
    pub fn new(outage_threshold_db: f64) -> Self {
        Self {
            matrix: HashMap::new(),
            outage_threshold_db,
        }
    }

    /// Record a UE's SINR reading at one cell, overwriting any stale value.
    pub fn report(&mut self, imsi: Imsi, cell: CellId, sinr_db: f64) {
        self.matrix.entry(imsi).or_default().insert(cell, sinr_db);
    }

    pub fn forget_ue(&mut self, imsi: Imsi) {
        self.matrix.remove(&imsi);
    }

    pub fn forget_cell(&mut self, imsi: Imsi, cell: CellId) {
        if let Some(cells) = self.matrix.get_mut(&imsi) {
            cells.remove(&cell);
        }
    }

    /// The best and second-best mmWave cells currently known for a UE,
    /// ranked by SINR descending. Ties break by the lower [`CellId`], so
    /// ranking is deterministic (spec §8 testable property: stable ranking
    /// under equal SINR).
    pub fn ranked(&self, imsi: Imsi) -> RankedCells {
        let mut entries: Vec<(CellId, f64)> = self
            .matrix
            .get(&imsi)
            .map(|m| m.iter().map(|(c, s)| (*c, *s)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));

        RankedCells {
            best: entries.first().copied(),
            second_best: entries.get(1).copied(),
        }
    }

    /// True if the given cell's last reading for this UE is below the
    /// outage threshold, or the UE has no reading for that cell at all
    /// (spec §4.4: silence is treated as outage, not "unknown").
    pub fn is_in_outage(&self, imsi: Imsi, cell: CellId) -> bool {
        match self.matrix.get(&imsi).and_then(|m| m.get(&cell)) {
            Some(sinr) => *sinr < self.outage_threshold_db,
            None => true,
        }
    }

    pub fn sinr_of(&self, imsi: Imsi, cell: CellId) -> Option<f64> {
        self.matrix.get(&imsi).and_then(|m| m.get(&cell)).copied()
    }

    /// Every IMSI with at least one recorded reading, for the control loop
    /// to iterate (spec §4.2 step 1: "for every IMSI in the SINR matrix").
    pub fn known_imsis(&self) -> impl Iterator<Item = Imsi> + '_ {
        self.matrix.keys().copied()
    }

    /// If this UE's second-best mmWave cell is still unknown, split-bearer
    /// setup must be deferred rather than proceeding with only a primary
    /// cell; the caller should retry after the returned delay. Returns
    /// `None` once a second-best cell has been reported.
    pub fn schedule_secondary_retry(&self, imsi: Imsi) -> Option<Micros> {
        match self.ranked(imsi).second_best {
            Some(_) => None,
            None => Some(SECONDARY_RETRY_INTERVAL_US),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_sorts_by_sinr_descending() {
        let mut agg = MeasurementAggregator::new(0.0);
        agg.report(Imsi(1), CellId(1), 5.0);
        agg.report(Imsi(1), CellId(2), 20.0);
        agg.report(Imsi(1), CellId(3), 12.0);

        let ranked = agg.ranked(Imsi(1));
        assert_eq!(ranked.best, Some((CellId(2), 20.0)));
        assert_eq!(ranked.second_best, Some((CellId(3), 12.0)));
    }

    #[test]
    fn ties_break_by_lower_cell_id() {
        let mut agg = MeasurementAggregator::new(0.0);
        agg.report(Imsi(1), CellId(5), 10.0);
        agg.report(Imsi(1), CellId(2), 10.0);

        let ranked = agg.ranked(Imsi(1));
        assert_eq!(ranked.best, Some((CellId(2), 10.0)));
    }

    #[test]
    fn unknown_cell_counts_as_outage() {
        let agg = MeasurementAggregator::new(-5.0);
        assert!(agg.is_in_outage(Imsi(9), CellId(1)));
    }

    #[test]
    fn below_threshold_is_outage_at_or_above_is_not() {
        let mut agg = MeasurementAggregator::new(0.0);
        agg.report(Imsi(1), CellId(1), -1.0);
        agg.report(Imsi(1), CellId(2), 0.0);
        assert!(agg.is_in_outage(Imsi(1), CellId(1)));
        assert!(!agg.is_in_outage(Imsi(1), CellId(2)));
    }

    #[test]
    fn secondary_retry_is_scheduled_until_a_second_cell_is_known() {
        let mut agg = MeasurementAggregator::new(0.0);
        agg.report(Imsi(1), CellId(1), 10.0);
        assert_eq!(agg.schedule_secondary_retry(Imsi(1)), Some(SECONDARY_RETRY_INTERVAL_US));

        agg.report(Imsi(1), CellId(2), 5.0);
        assert_eq!(agg.schedule_secondary_retry(Imsi(1)), None);
    }
}
