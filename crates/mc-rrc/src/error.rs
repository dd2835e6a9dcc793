//! Error types returned across the boundaries named in spec §7/§9.
//!
//! Genuine invariant violations ("the protocol guarantees these cannot occur
//! in normal operation") still produce [`McRrcError::InconsistentMapping`]
//! rather than a panic, so callers driving the core from a test harness or
//! the simulation binary can observe and report them instead of aborting.

use crate::ids::{CellId, DrbId, Imsi, Rnti};

#[derive(Debug, thiserror::Error)]
pub enum McRrcError {
    #[error("no RNTI available at cell {0}")]
    NoRntiAvailable(CellId),

    #[error("no non-contention preamble available at cell {0}")]
    NoPreamble(CellId),

    #[error("DRB table full at cell {0} rnti {1}")]
    ResourceExhausted(CellId, Rnti),

    #[error("unknown DRB {1:?} at cell {0} rnti {2}")]
    UnknownDrb(CellId, DrbId, Rnti),

    #[error("no UE-Manager for cell {0} rnti {1}")]
    UnknownUe(CellId, Rnti),

    #[error("no UE-Manager for imsi {0}")]
    UnknownImsi(Imsi),

    #[error("handover admission rejected by target cell {0}")]
    AdmissionDenied(CellId),

    #[error("RRC connection request rejected by cell {0}")]
    ConnectionRejected(CellId),

    #[error("operation invalid in state {0}")]
    InvalidState(&'static str),

    #[error("inconsistent internal mapping: {0}")]
    InconsistentMapping(&'static str),
}

pub type Result<T> = core::result::Result<T, McRrcError>;
