use tracing::trace;

use super::ShmemComm;
use crate::datatype::{Datatype, DatatypeOps};
use crate::lamellae::comm::{CommEpoch, CommRdma, Element, RdmaError, RdmaResult, UpdateOp};

impl<T: Element> CommRdma<T> for ShmemComm<T> {
    fn accumulate(
        &self,
        op: UpdateOp,
        src: &[T],
        src_type: &Datatype,
        pe: usize,
        disp: usize,
        dst_type: &Datatype,
    ) -> RdmaResult {
        self.check_pe(pe)?;
        if !self.holds_epoch(pe) {
            return Err(RdmaError::NoEpoch(pe));
        }
        if src_type.size() != dst_type.size() {
            return Err(RdmaError::TypeMismatch {
                src: src_type.size(),
                dst: dst_type.size(),
            });
        }
        if src_type.extent() > src.len() {
            return Err(RdmaError::SourceOutOfRange {
                extent: src_type.extent(),
                len: src.len(),
            });
        }
        let mut region = self.window.regions[pe].lock();
        if disp + dst_type.extent() > region.len() {
            return Err(RdmaError::TargetOutOfRange {
                pe,
                disp,
                extent: dst_type.extent(),
                len: region.len(),
            });
        }
        trace!(
            "pe {} {:?} {} elems to pe {} disp {} src {:?} dst {:?}",
            self.my_pe,
            op,
            src_type.size(),
            pe,
            disp,
            src_type,
            dst_type
        );
        let dst = &mut region[disp..];
        let mut src_runs = src_type.runs();
        let mut dst_runs = dst_type.runs();
        let mut s = src_runs.next();
        let mut d = dst_runs.next();
        // the two run lists cover the same number of elements but may split them differently
        while let (Some((s_off, s_len)), Some((d_off, d_len))) = (s, d) {
            let n = s_len.min(d_len);
            op.apply(&mut dst[d_off..d_off + n], &src[s_off..s_off + n]);
            s = if n == s_len {
                src_runs.next()
            } else {
                Some((s_off + n, s_len - n))
            };
            d = if n == d_len {
                dst_runs.next()
            } else {
                Some((d_off + n, d_len - n))
            };
        }
        Ok(())
    }

    fn read(&self, pe: usize, disp: usize, dst: &mut [T]) -> RdmaResult {
        self.check_pe(pe)?;
        let region = self.window.regions[pe].lock();
        if disp + dst.len() > region.len() {
            return Err(RdmaError::TargetOutOfRange {
                pe,
                disp,
                extent: dst.len(),
                len: region.len(),
            });
        }
        dst.copy_from_slice(&region[disp..disp + dst.len()]);
        Ok(())
    }

    fn with_local_region<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        let mut region = self.window.regions[self.my_pe].lock();
        f(&mut region)
    }
}
