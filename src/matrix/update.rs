use tracing::{debug, trace};

use super::batch::QueuedUpdate;
use super::encoder::target_disp;
use super::error::{MatrixError, MatrixResult};
use super::geometry::Block;
use super::TiledMatrix;
use crate::lamellae::{CommEpoch, CommRdma, Element, UpdateOp};

/// How an update is synchronized with its destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// open and close the destination epoch around every piece
    Blocking,
    /// keep destination epochs open, flushing once the outstanding threshold is reached
    NonBlocking,
    /// queue the pieces until the batch is executed
    Batch,
}

/// `src` must hold every row of `block` at row stride `src_ld`
fn check_source(block: &Block, len: usize, src_ld: usize) -> MatrixResult<()> {
    if src_ld < block.col_num {
        return Err(MatrixError::InvalidStride {
            src_ld,
            col_num: block.col_num,
        });
    }
    // a requirement that overflows can never be met by a real buffer
    let required = (block.row_num - 1)
        .checked_mul(src_ld)
        .and_then(|rows| rows.checked_add(block.col_num))
        .unwrap_or(usize::MAX);
    if len < required {
        return Err(MatrixError::InvalidBuffer { required, len });
    }
    Ok(())
}

impl<T: Element> TiledMatrix<T> {
    /// Transfer a single piece into the region of `pe`, an epoch on `pe` must be open.
    /// The piece must lie within the tile owned by `pe`.
    pub(crate) fn update_block_to_process(
        &self,
        pe: usize,
        op: UpdateOp,
        sub: &Block,
        src: &[T],
        src_ld: usize,
    ) -> MatrixResult<()> {
        let tile = self.geometry.tile(pe);
        if sub.is_empty() || !tile.contains(sub) {
            return Err(MatrixError::InvalidBlock(*sub));
        }
        let disp = target_disp(&tile, sub, self.ld_local);
        let encoding = self.encoder.encode(sub.row_num, sub.col_num, src_ld);
        trace!(
            "pe {} -> pe {}: {:?} {:?} disp {} via {:?}",
            self.my_pe(),
            pe,
            op,
            sub,
            disp,
            encoding.kind()
        );
        self.comm.accumulate(
            op,
            src,
            encoding.src_type(),
            pe,
            disp,
            encoding.dst_type(),
        )?;
        Ok(())
    }

    /// Open an epoch on `pe`, run `f`, and close the epoch again whatever `f` returned.
    pub(crate) fn with_epoch(
        &mut self,
        pe: usize,
        f: impl FnOnce(&Self) -> MatrixResult<()>,
    ) -> MatrixResult<()> {
        self.comm.lock(pe, self.lock_types[pe])?;
        let res = f(self);
        let unlock = self.comm.unlock(pe);
        res?;
        unlock?;
        Ok(())
    }

    fn open_nb_epoch(&mut self, pe: usize) -> MatrixResult<()> {
        let lock_type = self.lock_types[pe];
        if !self.comm.try_lock(pe, lock_type)? {
            // never wait on a destination while holding epochs on others
            if self.nb_total > 0 {
                debug!(
                    "pe {} epoch on pe {} busy, flushing {} outstanding ops first",
                    self.my_pe(),
                    pe,
                    self.nb_total
                );
                self.wait_nb()?;
            }
            self.comm.lock(pe, lock_type)?;
        }
        Ok(())
    }

    /// Complete every outstanding non-blocking operation and close every epoch they opened.
    ///
    /// All epochs are closed and all counters reset even if closing one of them fails,
    /// the first failure is returned.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn wait_nb(&mut self) -> MatrixResult<()> {
        let mut first_err = None;
        for pe in 0..self.nb_ops.len() {
            if self.nb_ops[pe] > 0 {
                if let Err(err) = self.comm.unlock(pe) {
                    first_err.get_or_insert(err);
                }
                self.nb_ops[pe] = 0;
            }
        }
        self.nb_total = 0;
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Replace or sum `block` of the logical matrix with the data in `src`,
    /// a row major buffer with row stride `src_ld`, using the given access mode.
    ///
    /// This call is not collective.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn update_block(
        &mut self,
        op: UpdateOp,
        block: Block,
        src: &[T],
        src_ld: usize,
        mode: AccessMode,
    ) -> MatrixResult<()> {
        self.geometry.validate(&block)?;
        check_source(&block, src.len(), src_ld)?;
        match mode {
            AccessMode::Batch if !self.batch.update_active() => {
                return Err(match op {
                    UpdateOp::Replace => MatrixError::NoBatchedPut,
                    UpdateOp::Sum => MatrixError::NoBatchedAcc,
                });
            }
            AccessMode::Blocking if self.nb_total > 0 => {
                self.wait_nb()?;
            }
            _ => {}
        }
        let subs = self.geometry.resolve(&block, src_ld).collect::<Vec<_>>();
        debug!(
            "pe {} {:?} {:?} {:?} over {} pe(s)",
            self.my_pe(),
            mode,
            op,
            block,
            subs.len()
        );
        for sub in subs {
            let sub_src = &src[sub.src_offset..];
            match mode {
                AccessMode::Blocking => {
                    self.with_epoch(sub.pe, |matrix| {
                        matrix.update_block_to_process(sub.pe, op, &sub.block, sub_src, src_ld)
                    })?;
                }
                AccessMode::NonBlocking => {
                    if self.nb_ops[sub.pe] == 0 {
                        self.open_nb_epoch(sub.pe)?;
                    }
                    let res =
                        self.update_block_to_process(sub.pe, op, &sub.block, sub_src, src_ld);
                    self.nb_ops[sub.pe] += 1;
                    self.nb_total += 1;
                    if self.nb_total >= self.max_nb_ops {
                        self.wait_nb()?;
                    }
                    res?;
                }
                AccessMode::Batch => {
                    self.queues[sub.pe].push(QueuedUpdate::new(op, sub.block, sub_src, src_ld));
                }
            }
        }
        Ok(())
    }

    /// Write `block` of the logical matrix from `src` (row stride `src_ld`).
    /// The data is in place when the call returns.
    pub fn put_block(&mut self, block: Block, src: &[T], src_ld: usize) -> MatrixResult<()> {
        self.update_block(UpdateOp::Replace, block, src, src_ld, AccessMode::Blocking)
    }

    /// Add `src` (row stride `src_ld`) to `block` of the logical matrix.
    /// The data is in place when the call returns.
    pub fn acc_block(&mut self, block: Block, src: &[T], src_ld: usize) -> MatrixResult<()> {
        self.update_block(UpdateOp::Sum, block, src, src_ld, AccessMode::Blocking)
    }

    /// Non-blocking [put_block][TiledMatrix::put_block], completed by the next flush
    pub fn put_block_nb(&mut self, block: Block, src: &[T], src_ld: usize) -> MatrixResult<()> {
        self.update_block(UpdateOp::Replace, block, src, src_ld, AccessMode::NonBlocking)
    }

    /// Non-blocking [acc_block][TiledMatrix::acc_block], completed by the next flush
    pub fn acc_block_nb(&mut self, block: Block, src: &[T], src_ld: usize) -> MatrixResult<()> {
        self.update_block(UpdateOp::Sum, block, src, src_ld, AccessMode::NonBlocking)
    }

    /// Queue a put of `block` to be performed by [exec_batch_put][TiledMatrix::exec_batch_put].
    /// The data is copied, `src` may be reused right away.
    pub fn add_put_block_request(
        &mut self,
        block: Block,
        src: &[T],
        src_ld: usize,
    ) -> MatrixResult<()> {
        self.update_block(UpdateOp::Replace, block, src, src_ld, AccessMode::Batch)
    }

    /// Queue an accumulate of `block` to be performed by [exec_batch_acc][TiledMatrix::exec_batch_acc].
    /// The data is copied, `src` may be reused right away.
    pub fn add_acc_block_request(
        &mut self,
        block: Block,
        src: &[T],
        src_ld: usize,
    ) -> MatrixResult<()> {
        self.update_block(UpdateOp::Sum, block, src, src_ld, AccessMode::Batch)
    }
}
