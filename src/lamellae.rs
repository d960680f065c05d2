//! The lamellae layer provides the one-sided transfer primitive the matrix is built on.
//!
//! A lamellae exposes one memory region per PE. Any PE can open an epoch on a
//! destination region, issue replace/sum accumulates described by [Datatype][crate::datatype::Datatype]s
//! against it, and close the epoch again, all without the destination PE running any code.
//! Currently a single backend exists: an in-process shared memory lamellae ("shmem")
//! where every PE is a thread of the same process.
use serde::Deserialize;

pub(crate) mod comm;
pub(crate) mod epoch;
pub(crate) mod shmem_lamellae;

pub(crate) use comm::*;
pub use comm::{Element, RdmaError, UpdateOp};
pub(crate) use shmem_lamellae::{ShmemComm, ShmemWindow};

/// The kind of epoch opened on a destination region
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// Only a single origin may hold an epoch on the destination
    Exclusive,
    /// Multiple origins may hold an epoch on the destination concurrently,
    /// accumulates issued under a shared epoch remain element atomic
    Shared,
}

impl Default for LockType {
    fn default() -> Self {
        crate::config().acc_lock
    }
}
