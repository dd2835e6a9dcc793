//! RLC entity kinds and their lossless-forwarding buffer access.
//!
//! Spec §9 calls out that AM buffer access needs its own shape (transmitted
//! and retransmission buffers, both keyed by RLC sequence number) distinct
//! from UM/SM (a single ordered TX queue). Modeled as an enum over the four
//! kinds named in spec §6 rather than a trait object, the same way the
//! teacher keeps `Ble`/`RadioCoprocessor` as concrete structs instead of
//! reaching for dynamic dispatch — there is a small closed set of kinds and
//! every call site already knows which bearer policy it is working with.

use std::collections::VecDeque;

use crate::config::EpsBearerToRlcMapping;

/// One queued service data unit, carrying an RLC sequence number once it has
/// been assigned (SM never assigns one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlcSdu {
    pub sn: Option<u16>,
    pub bytes: Vec<u8>,
}

/// How a lossless handover forwards out the bearer's queued data (spec §9
/// supplemented feature: the original's `m_forwardUpOnly`-style knob).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    /// Move the SDUs out of the source entity; the source queue ends empty.
    Drain,
    /// Leave the source entity's queue intact and hand the target a copy.
    Copy,
}

/// RLC kind selected for a bearer, per [`EpsBearerToRlcMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlcKind {
    /// Saturation Mode: no segmentation, no retransmission, no buffering
    /// beyond the immediate TX opportunity.
    Sm,
    /// Unacknowledged Mode.
    Um,
    /// Acknowledged Mode: distinct txed/retx buffers.
    Am,
    /// Low-latency UM variant used by mmWave legs.
    UmLowLat,
}

pub fn rlc_kind_for_bearer(mapping: EpsBearerToRlcMapping, per: f64) -> RlcKind {
    match mapping {
        EpsBearerToRlcMapping::RlcSmAlways => RlcKind::Sm,
        EpsBearerToRlcMapping::RlcUmAlways => RlcKind::Um,
        EpsBearerToRlcMapping::RlcAmAlways => RlcKind::Am,
        EpsBearerToRlcMapping::RlcUmLowlatAlways => RlcKind::UmLowLat,
        EpsBearerToRlcMapping::PerBased => {
            if per > 1.0e-5 {
                RlcKind::Um
            } else {
                RlcKind::Am
            }
        }
    }
}

/// An RLC entity's queued state. Only the parts needed for lossless
/// buffer-forwarding across a handover are modeled; segmentation and
/// retransmission timing live on the MAC/PHY side, out of scope here (spec
/// §1 non-goal: no PHY-layer simulation).
#[derive(Debug, Clone)]
pub struct RlcEntity {
    pub kind: RlcKind,
    tx_queue: VecDeque<RlcSdu>,
    /// AM only: SDUs handed to the MAC but not yet ACKed.
    txed_buffer: Vec<RlcSdu>,
    /// AM only: SDUs the peer NACKed, awaiting retransmission.
    retx_buffer: Vec<RlcSdu>,
    next_sn: u16,
}

impl RlcEntity {
    pub fn new(kind: RlcKind) -> Self {
        Self {
            kind,
            tx_queue: VecDeque::new(),
            txed_buffer: Vec::new(),
            retx_buffer: Vec::new(),
            next_sn: 0,
        }
    }

    /// Push an SDU down from PDCP. SM does not assign a sequence number,
    /// since it carries no retransmission or reordering state; the others
    /// assign from the same monotone 16-bit counter the original truncates
    /// to a shorter on-air field at serialization time (out of scope here).
    pub fn push_down(&mut self, bytes: Vec<u8>) {
        let sn = match self.kind {
            RlcKind::Sm => None,
            _ => {
                let sn = self.next_sn;
                self.next_sn = self.next_sn.wrapping_add(1);
                Some(sn)
            }
        };
        self.tx_queue.push_back(RlcSdu { sn, bytes });
    }

    /// Simulate a TX opportunity: dequeue the next SDU and, for AM, record
    /// it as in-flight (txed) rather than acked outright, since ACK
    /// processing is out of scope here and we conservatively treat
    /// "handed to the MAC" as "must still be forwarded on handover".
    pub fn pull_tx_opportunity(&mut self) -> Option<RlcSdu> {
        let sdu = self.tx_queue.pop_front()?;
        if self.kind == RlcKind::Am {
            self.txed_buffer.push(sdu.clone());
        }
        Some(sdu)
    }

    pub fn tx_buffer_size(&self) -> usize {
        self.tx_queue.iter().map(|s| s.bytes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_queue.is_empty() && self.txed_buffer.is_empty() && self.retx_buffer.is_empty()
    }

    /// Mark an in-flight SDU as NACKed by the peer, moving it from the txed
    /// buffer to the retransmission buffer. AM only; a no-op otherwise.
    pub fn nack(&mut self, sn: u16) {
        if self.kind != RlcKind::Am {
            return;
        }
        if let Some(pos) = self.txed_buffer.iter().position(|s| s.sn == Some(sn)) {
            let sdu = self.txed_buffer.remove(pos);
            self.retx_buffer.push(sdu);
        }
    }

    /// Drain every SDU still owed to the radio interface, in the lossless
    /// ordering spec §4.1.1 requires: for AM, the txed and retx buffers are
    /// merged by ascending RLC SN ahead of the plain TX queue (both already
    /// have SNs assigned; the TX queue's SDUs were never transmitted so they
    /// sort after, preserving submission order among themselves). For
    /// UM/UM-lowlat/SM there is only ever the one TX queue.
    ///
    /// `mode` controls whether this entity's own queues are left behind
    /// (`Copy`) or emptied (`Drain`); either way the returned `Vec` is what
    /// the target RLC entity should be primed with.
    pub fn forward(&mut self, mode: ForwardMode) -> Vec<RlcSdu> {
        let mut out = match self.kind {
            RlcKind::Am => {
                let mut combined: Vec<RlcSdu> = self
                    .txed_buffer
                    .iter()
                    .cloned()
                    .chain(self.retx_buffer.iter().cloned())
                    .collect();
                combined.sort_by_key(|s| s.sn.unwrap_or(u16::MAX));
                combined
            }
            RlcKind::Um | RlcKind::UmLowLat | RlcKind::Sm => Vec::new(),
        };
        out.extend(self.tx_queue.iter().cloned());

        if mode == ForwardMode::Drain {
            self.txed_buffer.clear();
            self.retx_buffer.clear();
            self.tx_queue.clear();
        }
        out
    }

    /// Prime a freshly created entity (at the handover target) with
    /// forwarded SDUs, re-queuing them for transmission in order.
    pub fn prime_with_forwarded(&mut self, sdus: Vec<RlcSdu>) {
        for sdu in sdus {
            self.tx_queue.push_back(sdu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn am_forward_merges_txed_and_retx_by_sn_ascending() {
        let mut rlc = RlcEntity::new(RlcKind::Am);
        for i in 0..5u8 {
            rlc.push_down(vec![i]);
        }
        // Hand the first 3 to the MAC (txed buffer now holds sn 0,1,2).
        rlc.pull_tx_opportunity();
        rlc.pull_tx_opportunity();
        rlc.pull_tx_opportunity();
        // NACK sn 1: moves from txed to retx.
        rlc.nack(1);

        let forwarded = rlc.forward(ForwardMode::Drain);
        let sns: Vec<u16> = forwarded.iter().map(|s| s.sn.unwrap()).collect();
        // txed now holds {0,2}, retx holds {1}, tx_queue holds {3,4}.
        assert_eq!(sns, vec![0, 1, 2, 3, 4]);
        assert!(rlc.is_empty());
    }

    #[test]
    fn copy_mode_leaves_source_queue_intact() {
        let mut rlc = RlcEntity::new(RlcKind::Um);
        rlc.push_down(vec![1]);
        rlc.push_down(vec![2]);

        let forwarded = rlc.forward(ForwardMode::Copy);
        assert_eq!(forwarded.len(), 2);
        assert!(!rlc.is_empty());
        assert_eq!(rlc.tx_buffer_size(), 2);
    }

    #[test]
    fn sm_never_assigns_sequence_numbers() {
        let mut rlc = RlcEntity::new(RlcKind::Sm);
        rlc.push_down(vec![9]);
        let sdu = rlc.pull_tx_opportunity().unwrap();
        assert_eq!(sdu.sn, None);
    }

    #[test]
    fn per_based_mapping_picks_am_below_threshold() {
        assert_eq!(
            rlc_kind_for_bearer(EpsBearerToRlcMapping::PerBased, 1.0e-6),
            RlcKind::Am
        );
        assert_eq!(
            rlc_kind_for_bearer(EpsBearerToRlcMapping::PerBased, 1.0e-4),
            RlcKind::Um
        );
    }
}
