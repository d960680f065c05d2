use tracing::debug;

use super::error::{MatrixError, MatrixResult};
use super::geometry::Block;
use super::TiledMatrix;
use crate::lamellae::{Element, UpdateOp};
use crate::warnings::MatrixWarning;

/// The batch session a matrix handle is in.
///
/// Batched puts and accumulates share a single session (and a single set of queues),
/// the operator is stored with every queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatchState {
    #[default]
    Idle,
    /// a batched get is active
    Get,
    /// a batched put/accumulate is active
    Update,
}

impl BatchState {
    pub(crate) fn update_active(&self) -> bool {
        matches!(self, BatchState::Update)
    }

    fn check_idle(&self, kind: BatchKind) -> MatrixResult<()> {
        match self {
            BatchState::Idle => Ok(()),
            BatchState::Get => Err(MatrixError::AlreadyBatchedGet),
            BatchState::Update => Err(kind.already()),
        }
    }

    fn check_update(&self, kind: BatchKind) -> MatrixResult<()> {
        if self.update_active() {
            Ok(())
        } else {
            Err(kind.missing())
        }
    }
}

/// Which flavor of the batch entry points was called, only used to pick the error reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchKind {
    Put,
    Acc,
}

impl BatchKind {
    fn already(&self) -> MatrixError {
        match self {
            BatchKind::Put => MatrixError::AlreadyBatchedPut,
            BatchKind::Acc => MatrixError::AlreadyBatchedAcc,
        }
    }

    fn missing(&self) -> MatrixError {
        match self {
            BatchKind::Put => MatrixError::NoBatchedPut,
            BatchKind::Acc => MatrixError::NoBatchedAcc,
        }
    }
}

/// A deferred piece of an update, owning a dense copy of its source data
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueuedUpdate<T> {
    pub(crate) op: UpdateOp,
    pub(crate) block: Block,
    /// `block.row_num` rows of `block.col_num` elements, packed
    pub(crate) data: Vec<T>,
}

impl<T: Element> QueuedUpdate<T> {
    /// copy `block` out of `src`, whose first element is the block's origin and whose row stride is `src_ld`
    pub(crate) fn new(op: UpdateOp, block: Block, src: &[T], src_ld: usize) -> QueuedUpdate<T> {
        let mut data = Vec::with_capacity(block.len());
        for row in 0..block.row_num {
            let start = row * src_ld;
            data.extend_from_slice(&src[start..start + block.col_num]);
        }
        QueuedUpdate { op, block, data }
    }
}

/// The requests queued for a single destination, in enqueue order
#[derive(Debug, Clone)]
pub(crate) struct RequestQueue<T> {
    reqs: Vec<QueuedUpdate<T>>,
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        RequestQueue { reqs: Vec::new() }
    }
}

impl<T> RequestQueue<T> {
    pub(crate) fn push(&mut self, req: QueuedUpdate<T>) {
        self.reqs.push(req);
    }

    /// drop every queued request, returning how many there were
    pub(crate) fn reset(&mut self) -> usize {
        let cnt = self.reqs.len();
        self.reqs.clear();
        cnt
    }

    pub(crate) fn len(&self) -> usize {
        self.reqs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.reqs.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &QueuedUpdate<T>> {
        self.reqs.iter()
    }
}

impl<T: Element> TiledMatrix<T> {
    fn start_batch_update(&mut self, kind: BatchKind) -> MatrixResult<()> {
        self.batch.check_idle(kind)?;
        for queue in self.queues.iter_mut() {
            queue.reset();
        }
        self.batch = BatchState::Update;
        debug!("pe {} started batch ({:?})", self.my_pe(), kind);
        Ok(())
    }

    fn exec_batch_update(&mut self, kind: BatchKind) -> MatrixResult<()> {
        self.batch.check_update(kind)?;
        if self.nb_total > 0 {
            self.wait_nb()?;
        }
        let num_pes = self.num_pes();
        let my_pe = self.my_pe();
        // start at our own rank so the group does not pile onto pe 0
        for pe in (0..num_pes).map(|i| (my_pe + i) % num_pes) {
            if self.queues[pe].is_empty() {
                continue;
            }
            let queue = std::mem::take(&mut self.queues[pe]);
            debug!(
                "pe {} replaying {} queued request(s) to pe {}",
                my_pe,
                queue.len(),
                pe
            );
            self.with_epoch(pe, |matrix| {
                for req in queue.iter() {
                    matrix.update_block_to_process(
                        pe,
                        req.op,
                        &req.block,
                        &req.data,
                        req.block.col_num,
                    )?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn stop_batch_update(&mut self, kind: BatchKind) -> MatrixResult<()> {
        self.batch.check_update(kind)?;
        let discarded = self.queues.iter_mut().map(|q| q.reset()).sum::<usize>();
        MatrixWarning::DiscardedBatch(discarded).print();
        self.batch = BatchState::Idle;
        debug!(
            "pe {} stopped batch ({:?}), {} request(s) discarded",
            self.my_pe(),
            kind,
            discarded
        );
        Ok(())
    }

    /// Open a batch session, after which [add_put_block_request][TiledMatrix::add_put_block_request]
    /// and [add_acc_block_request][TiledMatrix::add_acc_block_request] queue their updates.
    ///
    /// Fails if any batch (get, put or accumulate) is already active.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn start_batch_put(&mut self) -> MatrixResult<()> {
        self.start_batch_update(BatchKind::Put)
    }

    /// Same session as [start_batch_put][TiledMatrix::start_batch_put], reporting accumulate flavored errors
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn start_batch_acc(&mut self) -> MatrixResult<()> {
        self.start_batch_update(BatchKind::Acc)
    }

    /// Transfer every queued request, one epoch per destination, visiting destinations
    /// starting from this PE's own rank. Requests to a destination are applied in the order they were queued.
    ///
    /// On failure the remaining destinations keep their queues and the session stays active.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn exec_batch_put(&mut self) -> MatrixResult<()> {
        self.exec_batch_update(BatchKind::Put)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    pub fn exec_batch_acc(&mut self) -> MatrixResult<()> {
        self.exec_batch_update(BatchKind::Acc)
    }

    /// Close the batch session. Requests still queued are discarded (with a warning).
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn stop_batch_put(&mut self) -> MatrixResult<()> {
        self.stop_batch_update(BatchKind::Put)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    pub fn stop_batch_acc(&mut self) -> MatrixResult<()> {
        self.stop_batch_update(BatchKind::Acc)
    }

    /// Mark a batched get as active, which blocks batched updates until
    /// [leave_batch_get][TiledMatrix::leave_batch_get] is called
    pub fn enter_batch_get(&mut self) -> MatrixResult<()> {
        match self.batch {
            BatchState::Idle => {
                self.batch = BatchState::Get;
                Ok(())
            }
            BatchState::Get => Err(MatrixError::AlreadyBatchedGet),
            BatchState::Update => Err(MatrixError::AlreadyBatchedPut),
        }
    }

    pub fn leave_batch_get(&mut self) -> MatrixResult<()> {
        match self.batch {
            BatchState::Get => {
                self.batch = BatchState::Idle;
                Ok(())
            }
            _ => Err(MatrixError::NoBatchedGet),
        }
    }
}
