//! A dense matrix tiled over a group of PEs, updated with one-sided operations.
//!
//! The logical `nrows` x `ncols` matrix is cut by a row boundary table and a column
//! boundary table into an R x C grid of tiles; PE `i * C + j` owns tile (`i`, `j`) and exposes
//! it, row major with the matrix wide row stride [ld_local][TiledMatrix::ld_local], through the lamellae.
//!
//! Any PE can replace ([put_block][TiledMatrix::put_block]) or sum into ([acc_block][TiledMatrix::acc_block])
//! an arbitrary [Block] of the logical matrix. The block is split into the pieces owned by each
//! destination, and each piece is transferred directly into the destination's region, the
//! destination PE does not participate.
//!
//! Three access modes are provided:
//! - blocking: an epoch is opened and closed on the destination around every piece,
//!   the update is complete when the call returns.
//! - non-blocking (`*_nb`): epochs stay open across calls, and are all closed together once the
//!   number of outstanding operations reaches the flush threshold or [wait_nb][TiledMatrix::wait_nb] is called.
//! - batched: pieces are queued per destination between [start_batch_put][TiledMatrix::start_batch_put]
//!   and [stop_batch_put][TiledMatrix::stop_batch_put], and transferred by [exec_batch_put][TiledMatrix::exec_batch_put]
//!   with one epoch per destination.
//!
//! # Examples
//!```
//! use lamellar_matrix::{Block, MatrixBuilder};
//!
//! let handles = MatrixBuilder::<f64>::new(4, 4).proc_grid(2, 2).build().unwrap();
//! let threads = handles
//!     .into_iter()
//!     .map(|mut matrix| {
//!         std::thread::spawn(move || {
//!             if matrix.my_pe() == 0 {
//!                 let src: Vec<f64> = (0..16).map(|i| i as f64).collect();
//!                 matrix.put_block(Block::new(0, 4, 0, 4), &src, 4).unwrap();
//!             }
//!             matrix.sync().unwrap();
//!             matrix
//!         })
//!     })
//!     .collect::<Vec<_>>();
//! let matrices = threads.into_iter().map(|t| t.join().unwrap()).collect::<Vec<_>>();
//! // pe 3 owns the lower right quadrant
//! assert_eq!(matrices[3].local_tile().unwrap(), vec![10.0, 11.0, 14.0, 15.0]);
//!```
pub(crate) mod batch;
pub(crate) mod builder;
pub(crate) mod encoder;
pub(crate) mod error;
pub(crate) mod geometry;
pub(crate) mod update;

pub use batch::BatchState;
pub use builder::MatrixBuilder;
pub use error::{MatrixError, MatrixResult};
pub use geometry::Block;
pub use update::AccessMode;

use batch::RequestQueue;
use encoder::TransferEncoder;
use geometry::Geometry;

use std::sync::Arc;

use crate::lamellae::{CommEpoch, CommInfo, CommRdma, Element, LockType, ShmemComm};

/// Counters of the one-off datatypes registered by a pe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatatypeStats {
    /// currently registered (always 0 between calls)
    pub live: usize,
    /// registered since the matrix was created
    pub committed: usize,
}

/// One PE's handle to a distributed tiled matrix.
///
/// Handles are created together by a [MatrixBuilder], one per PE, and each is meant to be driven
/// by a single thread. None of the update operations are collective.
#[derive(Debug)]
pub struct TiledMatrix<T: Element> {
    pub(crate) geometry: Arc<Geometry>,
    pub(crate) ld_local: usize,
    pub(crate) comm: ShmemComm<T>,
    pub(crate) encoder: TransferEncoder,
    pub(crate) lock_types: Vec<LockType>,
    /// non-blocking operations issued per destination since its epoch was opened
    pub(crate) nb_ops: Vec<usize>,
    pub(crate) nb_total: usize,
    pub(crate) max_nb_ops: usize,
    pub(crate) queues: Vec<RequestQueue<T>>,
    pub(crate) batch: BatchState,
}

impl<T: Element> TiledMatrix<T> {
    /// The id of the PE owning this handle
    pub fn my_pe(&self) -> usize {
        self.comm.my_pe()
    }

    /// The number of PEs the matrix is tiled over
    pub fn num_pes(&self) -> usize {
        self.comm.num_pes()
    }

    pub fn nrows(&self) -> usize {
        self.geometry.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.geometry.ncols()
    }

    /// (row blocks, column blocks) of the process grid
    pub fn proc_grid(&self) -> (usize, usize) {
        (
            self.geometry.rows.num_blocks(),
            self.geometry.cols.num_blocks(),
        )
    }

    /// The row stride of every PE's exposed region
    pub fn ld_local(&self) -> usize {
        self.ld_local
    }

    /// The tile of the logical matrix owned by `pe`, `None` if `pe` is not part of the matrix
    pub fn tile_bounds(&self, pe: usize) -> Option<Block> {
        (pe < self.num_pes()).then(|| self.geometry.tile(pe))
    }

    /// The PE owning element (`row`, `col`), `None` if it is outside of the matrix
    pub fn owner_of(&self, row: usize, col: usize) -> Option<usize> {
        self.geometry.owner_of(row, col)
    }

    /// The lock type used when opening an epoch on `pe`
    pub fn lock_type(&self, pe: usize) -> Option<LockType> {
        self.lock_types.get(pe).copied()
    }

    /// The (pe, piece) pairs an update of `block` is split into
    pub fn decompose(&self, block: Block) -> MatrixResult<Vec<(usize, Block)>> {
        self.geometry.validate(&block)?;
        Ok(self
            .geometry
            .resolve(&block, block.col_num)
            .map(|sub| (sub.pe, sub.block))
            .collect())
    }

    /// Non-blocking operations issued and not yet flushed
    pub fn outstanding(&self) -> usize {
        self.nb_total
    }

    /// Non-blocking operations issued to `pe` and not yet flushed
    pub fn outstanding_to(&self, pe: usize) -> Option<usize> {
        self.nb_ops.get(pe).copied()
    }

    /// Number of destination epochs this PE currently holds open
    pub fn held_epochs(&self) -> usize {
        self.comm.num_held()
    }

    /// Whether any PE currently holds an epoch on `pe`, false if `pe` is not part of the matrix
    pub fn epoch_open_on(&self, pe: usize) -> bool {
        pe < self.num_pes() && self.comm.window.epoch_locked(pe)
    }

    /// Number of batched requests queued for `pe`
    pub fn queued(&self, pe: usize) -> Option<usize> {
        self.queues.get(pe).map(|q| q.len())
    }

    pub fn batch_state(&self) -> BatchState {
        self.batch
    }

    pub fn datatype_stats(&self) -> DatatypeStats {
        DatatypeStats {
            live: self.encoder.registry().live(),
            committed: self.encoder.registry().committed(),
        }
    }

    /// Set every element of this PE's own tile to `val`.
    ///
    /// Purely local, other PEs only observe the change after a [sync][TiledMatrix::sync].
    pub fn fill(&mut self, val: T) {
        self.comm.with_local_region(|region| region.fill(val));
    }

    /// Complete this PE's non-blocking operations then wait for every PE of the group to do the same.
    ///
    /// # Collective Operation
    /// Requires all PEs of the matrix to enter the call otherwise deadlock will occur.
    pub fn sync(&mut self) -> MatrixResult<()> {
        self.wait_nb()?;
        self.comm.barrier();
        Ok(())
    }

    /// A dense (tile rows x tile cols) copy of the tile owned by `pe`.
    ///
    /// No epoch is opened, the copy reflects every operation completed before the call.
    pub fn tile_snapshot(&self, pe: usize) -> MatrixResult<Vec<T>> {
        if pe >= self.num_pes() {
            return Err(crate::lamellae::RdmaError::InvalidPe(pe).into());
        }
        let tile = self.geometry.tile(pe);
        let mut data = vec![T::default(); tile.len()];
        for (row, dst) in data.chunks_mut(tile.col_num).enumerate() {
            self.comm.read(pe, row * self.ld_local, dst)?;
        }
        Ok(data)
    }

    /// A dense copy of this PE's own tile
    pub fn local_tile(&self) -> MatrixResult<Vec<T>> {
        self.tile_snapshot(self.my_pe())
    }
}
