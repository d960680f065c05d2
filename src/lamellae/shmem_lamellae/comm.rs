use tracing::debug;

use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use super::ShmemWindow;
use crate::lamellae::comm::{CommEpoch, CommInfo, RdmaError, RdmaResult};
use crate::lamellae::LockType;

/// The view a single pe has of a [ShmemWindow], tracking the epochs it holds
pub(crate) struct ShmemComm<T> {
    pub(crate) my_pe: usize,
    pub(crate) window: Arc<ShmemWindow<T>>,
    held: Vec<Option<LockType>>,
}

impl<T> std::fmt::Debug for ShmemComm<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ShmemComm {{ my_pe: {}, num_pes: {}, held: {:?} }}",
            self.my_pe,
            self.window.num_pes(),
            self.held
        )
    }
}

impl<T> ShmemComm<T> {
    pub(super) fn new(my_pe: usize, window: Arc<ShmemWindow<T>>) -> ShmemComm<T> {
        let num_pes = window.num_pes();
        ShmemComm {
            my_pe,
            window,
            held: vec![None; num_pes],
        }
    }

    pub(super) fn check_pe(&self, pe: usize) -> RdmaResult {
        if pe < self.window.num_pes() {
            Ok(())
        } else {
            Err(RdmaError::InvalidPe(pe))
        }
    }
}

impl<T> CommInfo for ShmemComm<T> {
    fn my_pe(&self) -> usize {
        self.my_pe
    }
    fn num_pes(&self) -> usize {
        self.window.num_pes()
    }
}

impl<T> CommEpoch for ShmemComm<T> {
    fn lock(&mut self, pe: usize, lock_type: LockType) -> RdmaResult {
        self.check_pe(pe)?;
        if self.held[pe].is_some() {
            return Err(RdmaError::EpochHeld(pe));
        }
        self.window.epochs[pe].lock(self.my_pe, pe, lock_type);
        self.held[pe] = Some(lock_type);
        debug!("pe {} opened {:?} epoch on pe {}", self.my_pe, lock_type, pe);
        Ok(())
    }

    fn try_lock(&mut self, pe: usize, lock_type: LockType) -> Result<bool, RdmaError> {
        self.check_pe(pe)?;
        if self.held[pe].is_some() {
            return Err(RdmaError::EpochHeld(pe));
        }
        if self.window.epochs[pe].try_lock(self.my_pe, lock_type) {
            self.held[pe] = Some(lock_type);
            debug!("pe {} opened {:?} epoch on pe {}", self.my_pe, lock_type, pe);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn unlock(&mut self, pe: usize) -> RdmaResult {
        self.check_pe(pe)?;
        let lock_type = self.held[pe].take().ok_or(RdmaError::NoEpoch(pe))?;
        self.flush(pe)?;
        self.window.epochs[pe].unlock(self.my_pe, lock_type);
        debug!("pe {} closed {:?} epoch on pe {}", self.my_pe, lock_type, pe);
        Ok(())
    }

    fn flush(&self, pe: usize) -> RdmaResult {
        self.check_pe(pe)?;
        // operations are applied under the region lock when issued,
        // so completion only needs them ordered before whatever follows
        fence(Ordering::SeqCst);
        Ok(())
    }

    fn holds_epoch(&self, pe: usize) -> bool {
        matches!(self.held.get(pe), Some(Some(_)))
    }

    fn num_held(&self) -> usize {
        self.held.iter().filter(|h| h.is_some()).count()
    }

    fn barrier(&self) {
        self.window.barrier.wait();
    }
}

impl<T> Drop for ShmemComm<T> {
    fn drop(&mut self) {
        fence(Ordering::SeqCst);
        for pe in 0..self.held.len() {
            if let Some(lock_type) = self.held[pe].take() {
                debug!(
                    "pe {} releasing {:?} epoch on pe {} at drop",
                    self.my_pe, lock_type, pe
                );
                self.window.epochs[pe].unlock(self.my_pe, lock_type);
            }
        }
    }
}
