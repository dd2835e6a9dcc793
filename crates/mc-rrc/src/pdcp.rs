//! Bearer-Split-PDCP: a PDCP entity that can fan a bearer's SDUs out across
//! the LTE-local RLC and up to two remote mmWave RLC legs, per spec §4.2.
//!
//! Grounded on the teacher's `Ble` struct in shape (a small entity holding
//! onto channel state and forwarding buffers, `send`/`recv`-style methods
//! guarded by which link is currently active) generalized from one RX/TX
//! channel pair to three downstream destinations plus a duplication mode.

use crate::ids::{CellId, Rnti};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdcpPath {
    LteLocal,
    MmWaveA,
    MmWaveB,
}

/// Target for a PDCP PDU once it leaves the local RLC/X2 boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTarget {
    pub cell: CellId,
    pub rnti: Rnti,
}

/// One PDCP SDU, numbered with the entity's monotone 12-bit sequence number
/// (spec §4.2: PDCP SN wraps at 4096, same width as the original's
/// `SequenceNumber12`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdcpPdu {
    pub sn: u16,
    pub bytes: Vec<u8>,
}

const PDCP_SN_MODULUS: u16 = 4096;

/// Bearer-Split-PDCP entity for one DRB. At any time exactly one of
/// [`PdcpPath::LteLocal`]/`MmWaveA`/`MmWaveB` is the active downstream path,
/// unless `duplicate` is set, in which case every configured remote target
/// additionally receives a copy (spec §4.2, duplication mode).
#[derive(Debug, Clone)]
pub struct PdcpEntity {
    next_tx_sn: u16,
    active_path: PdcpPath,
    mm_wave_a: Option<RemoteTarget>,
    mm_wave_b: Option<RemoteTarget>,
    duplicate: bool,
}

impl PdcpEntity {
    pub fn new() -> Self {
        Self {
            next_tx_sn: 0,
            active_path: PdcpPath::LteLocal,
            mm_wave_a: None,
            mm_wave_b: None,
            duplicate: false,
        }
    }

    pub fn active_path(&self) -> PdcpPath {
        self.active_path
    }

    /// Configure which cell/RNTI back the two remote legs. Passing `None`
    /// tears a leg down (spec §4.1.2: a UE may run with only one mmWave leg
    /// attached).
    pub fn set_remote_targets(&mut self, a: Option<RemoteTarget>, b: Option<RemoteTarget>) {
        self.mm_wave_a = a;
        self.mm_wave_b = b;
    }

    pub fn set_duplicate_mode(&mut self, duplicate: bool) {
        self.duplicate = duplicate;
    }

    /// Switch the active downstream path (spec §4.1.3: LTE<->mmWave
    /// connection switch). Switching to a remote path that has no
    /// configured target is a caller error; checked by the UE-Manager
    /// before it ever calls this, so we only debug_assert here.
    pub fn switch_connection(&mut self, path: PdcpPath) {
        debug_assert!(
            match path {
                PdcpPath::LteLocal => true,
                PdcpPath::MmWaveA => self.mm_wave_a.is_some(),
                PdcpPath::MmWaveB => self.mm_wave_b.is_some(),
            },
            "switching to a path with no remote target configured"
        );
        self.active_path = path;
    }

    /// Number and hand an SDU to whichever path(s) are active, returning the
    /// numbered PDU(s) to deliver: one for the active path, plus one per
    /// remote leg still listed when duplication is enabled. All copies under
    /// duplication share the same SN, per the original's `DuplicatePdcpSdu`.
    pub fn transmit_pdcp_sdu(&mut self, bytes: Vec<u8>) -> Vec<(PdcpPath, PdcpPdu)> {
        let sn = self.next_tx_sn;
        self.next_tx_sn = (self.next_tx_sn + 1) % PDCP_SN_MODULUS;

        let mut out = vec![(
            self.active_path,
            PdcpPdu {
                sn,
                bytes: bytes.clone(),
            },
        )];

        if self.duplicate {
            for (path, target) in [
                (PdcpPath::MmWaveA, self.mm_wave_a),
                (PdcpPath::MmWaveB, self.mm_wave_b),
            ] {
                if target.is_some() && path != self.active_path {
                    out.push((
                        path,
                        PdcpPdu {
                            sn,
                            bytes: bytes.clone(),
                        },
                    ));
                }
            }
        }

        out
    }

    pub fn remote_target(&self, path: PdcpPath) -> Option<RemoteTarget> {
        match path {
            PdcpPath::LteLocal => None,
            PdcpPath::MmWaveA => self.mm_wave_a,
            PdcpPath::MmWaveB => self.mm_wave_b,
        }
    }
}

impl Default for PdcpEntity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(cell: u16, rnti: u16) -> RemoteTarget {
        RemoteTarget {
            cell: CellId(cell),
            rnti: Rnti(rnti),
        }
    }

    #[test]
    fn sequence_number_wraps_at_modulus() {
        let mut pdcp = PdcpEntity::new();
        for _ in 0..PDCP_SN_MODULUS {
            pdcp.transmit_pdcp_sdu(vec![0]);
        }
        let (_, pdu) = &pdcp.transmit_pdcp_sdu(vec![0])[0];
        assert_eq!(pdu.sn, 0);
    }

    #[test]
    fn duplication_mode_fans_out_to_both_remote_legs() {
        let mut pdcp = PdcpEntity::new();
        pdcp.set_remote_targets(Some(target(1, 10)), Some(target(2, 20)));
        pdcp.switch_connection(PdcpPath::MmWaveA);
        pdcp.set_duplicate_mode(true);

        let out = pdcp.transmit_pdcp_sdu(vec![1, 2, 3]);
        let paths: Vec<PdcpPath> = out.iter().map(|(p, _)| *p).collect();
        assert_eq!(paths, vec![PdcpPath::MmWaveA, PdcpPath::MmWaveB]);
        assert_eq!(out[0].1.sn, out[1].1.sn);
    }

    #[test]
    fn without_duplication_only_active_path_gets_the_pdu() {
        let mut pdcp = PdcpEntity::new();
        pdcp.set_remote_targets(Some(target(1, 10)), Some(target(2, 20)));
        pdcp.switch_connection(PdcpPath::MmWaveA);

        let out = pdcp.transmit_pdcp_sdu(vec![7]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, PdcpPath::MmWaveA);
    }
}
