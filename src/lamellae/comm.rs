pub(crate) mod error;
pub(crate) mod rdma;

pub use error::RdmaError;
pub(crate) use error::*;
pub use rdma::{Element, UpdateOp};
pub(crate) use rdma::*;

use super::LockType;

pub(crate) trait CommInfo {
    fn my_pe(&self) -> usize;
    fn num_pes(&self) -> usize;
}

/// Passive target synchronization: epochs are opened and closed by the origin only
pub(crate) trait CommEpoch {
    /// open an epoch on `pe`, blocking until no conflicting epoch is held by another origin
    fn lock(&mut self, pe: usize, lock_type: LockType) -> RdmaResult;
    /// open an epoch on `pe` only if it can be granted without waiting
    fn try_lock(&mut self, pe: usize, lock_type: LockType) -> Result<bool, RdmaError>;
    /// close the epoch on `pe`, completing every operation issued in it
    fn unlock(&mut self, pe: usize) -> RdmaResult;
    /// complete every operation issued to `pe` without closing the epoch
    fn flush(&self, pe: usize) -> RdmaResult;
    fn holds_epoch(&self, pe: usize) -> bool;
    fn num_held(&self) -> usize;
    // this is a global barrier across every pe of the window
    fn barrier(&self);
}
