pub(crate) mod comm;
pub(crate) mod rdma;

pub(crate) use comm::ShmemComm;

use parking_lot::Mutex;

use std::sync::{Arc, Barrier};

use super::epoch::EpochLock;
use super::Element;

/// The memory exposed by every pe of a group, shared by all of their [ShmemComm] handles.
pub(crate) struct ShmemWindow<T> {
    regions: Vec<Mutex<Vec<T>>>,
    epochs: Vec<EpochLock>,
    barrier: Barrier,
}

impl<T> std::fmt::Debug for ShmemWindow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ShmemWindow {{ num_pes: {}, region_lens: {:?} }}",
            self.regions.len(),
            self.regions
                .iter()
                .map(|r| r.lock().len())
                .collect::<Vec<_>>(),
        )
    }
}

impl<T: Element> ShmemWindow<T> {
    /// allocate one zero initialized region of `region_lens[pe]` elements per pe
    pub(crate) fn new(region_lens: &[usize]) -> Arc<ShmemWindow<T>> {
        Arc::new(ShmemWindow {
            regions: region_lens
                .iter()
                .map(|len| Mutex::new(vec![T::default(); *len]))
                .collect(),
            epochs: region_lens.iter().map(|_| EpochLock::new()).collect(),
            barrier: Barrier::new(region_lens.len()),
        })
    }

    /// the origin side handle used by `my_pe`
    pub(crate) fn comm(self: &Arc<Self>, my_pe: usize) -> ShmemComm<T> {
        assert!(my_pe < self.num_pes(), "pe {my_pe} is not part of the window");
        ShmemComm::new(my_pe, self.clone())
    }
}

impl<T> ShmemWindow<T> {
    pub(crate) fn num_pes(&self) -> usize {
        self.regions.len()
    }

    /// true if any origin holds an epoch on `pe`
    pub(crate) fn epoch_locked(&self, pe: usize) -> bool {
        self.epochs[pe].is_locked()
    }
}
