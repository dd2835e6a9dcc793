//! Identity newtypes shared across the core: cells, UEs, bearers.

use core::fmt;

/// Permanent subscriber identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Imsi(pub u64);

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imsi={}", self.0)
    }
}

/// Per-cell short UE identity, assigned on RACH and reused after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// RNTI 0 is never assigned; used as a sentinel for "unknown".
    pub const UNKNOWN: Rnti = Rnti(0);

    pub fn is_known(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rnti={}", self.0)
    }
}

/// Base station / cell identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellId(pub u16);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell={}", self.0)
    }
}

/// Data Radio Bearer identity. Valid range is 1..=31; 0 is never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct DrbId(pub u8);

/// EPS bearer identity as handed down from the S1/core side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EpsBearerId(pub u8);

/// Logical channel identity derived 1:1 from a DRB at setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct LcId(pub u8);

/// GTP tunnel endpoint identifier used on the S1-U / X2 user-plane paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Teid(pub u32);

/// Which of the two mmWave legs of a multi-connectivity UE an item concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Leg {
    /// Primary mmWave leg (group A, e.g. 28 GHz).
    Primary,
    /// Secondary mmWave leg (group B, e.g. 73 GHz).
    Secondary,
}

impl Leg {
    pub fn index(self) -> usize {
        match self {
            Leg::Primary => 0,
            Leg::Secondary => 1,
        }
    }
}
