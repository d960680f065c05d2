use tracing::debug;

use std::marker::PhantomData;
use std::sync::Arc;

use super::batch::{BatchState, RequestQueue};
use super::encoder::TransferEncoder;
use super::geometry::{BlockPartition, Geometry};
use super::TiledMatrix;
use crate::datatype::DatatypeCache;
use crate::lamellae::{Element, LockType, ShmemWindow};

/// Creates the handles of a distributed [TiledMatrix], one per PE.
///
/// Unset options fall back to the environment [Config][crate::Config].
///
/// # Examples
///```
/// use lamellar_matrix::{LockType, MatrixBuilder};
///
/// let handles = MatrixBuilder::<i64>::new(10, 6)
///     .row_displs(vec![0, 3, 10])
///     .proc_grid(2, 3)
///     .lock_type(LockType::Exclusive)
///     .nb_flush_threshold(4)
///     .build()
///     .unwrap();
/// assert_eq!(handles.len(), 6);
/// assert_eq!(handles[4].tile_bounds(4).unwrap().row_start, 3);
/// assert_eq!(handles[0].ld_local(), 2);
///```
#[derive(Debug, Clone)]
pub struct MatrixBuilder<T> {
    nrows: usize,
    ncols: usize,
    grid: Option<(usize, usize)>,
    row_displs: Option<Vec<usize>>,
    col_displs: Option<Vec<usize>>,
    lock_type: Option<LockType>,
    max_nb_ops: Option<usize>,
    sb_dim_max: Option<usize>,
    _phantom: PhantomData<T>,
}

impl<T: Element> MatrixBuilder<T> {
    pub fn new(nrows: usize, ncols: usize) -> MatrixBuilder<T> {
        MatrixBuilder {
            nrows,
            ncols,
            grid: None,
            row_displs: None,
            col_displs: None,
            lock_type: None,
            max_nb_ops: None,
            sb_dim_max: None,
            _phantom: PhantomData,
        }
    }

    /// Split the matrix into `row_blocks` x `col_blocks` tiles (default 1 x 1)
    pub fn proc_grid(mut self, row_blocks: usize, col_blocks: usize) -> Self {
        self.grid = Some((row_blocks, col_blocks));
        self
    }

    /// Explicit row boundaries, `displs[i]` is the first row of block row `i` and the last entry is `nrows`.
    /// When no grid is given the number of row blocks is taken from the table.
    pub fn row_displs(mut self, displs: Vec<usize>) -> Self {
        self.row_displs = Some(displs);
        self
    }

    /// Explicit column boundaries, see [row_displs][MatrixBuilder::row_displs]
    pub fn col_displs(mut self, displs: Vec<usize>) -> Self {
        self.col_displs = Some(displs);
        self
    }

    /// The epoch lock type used for every destination
    pub fn lock_type(mut self, lock_type: LockType) -> Self {
        self.lock_type = Some(lock_type);
        self
    }

    /// Outstanding non-blocking updates that force a flush
    pub fn nb_flush_threshold(mut self, max_nb_ops: usize) -> Self {
        self.max_nb_ops = Some(max_nb_ops);
        self
    }

    /// Largest block dimension served by the precomputed datatypes
    pub fn small_block_dim(mut self, sb_dim_max: usize) -> Self {
        self.sb_dim_max = Some(sb_dim_max);
        self
    }

    fn partition(
        len: usize,
        displs: Option<Vec<usize>>,
        blocks: Option<usize>,
        what: &str,
    ) -> anyhow::Result<BlockPartition> {
        anyhow::ensure!(len > 0, "matrix must have at least one {what}");
        match displs {
            Some(displs) => {
                let partition = BlockPartition::from_displs(displs, len)?;
                if let Some(blocks) = blocks {
                    anyhow::ensure!(
                        partition.num_blocks() == blocks,
                        "{what} boundary table has {} blocks but the process grid has {}",
                        partition.num_blocks(),
                        blocks
                    );
                }
                Ok(partition)
            }
            None => {
                let blocks = blocks.unwrap_or(1);
                anyhow::ensure!(
                    blocks <= len,
                    "cannot split {len} {what}s into {blocks} non-empty blocks"
                );
                BlockPartition::even(len, blocks)
            }
        }
    }

    /// Create the handles, in rank order.
    pub fn build(self) -> anyhow::Result<Vec<TiledMatrix<T>>> {
        let config = crate::config();
        let rows = Self::partition(
            self.nrows,
            self.row_displs,
            self.grid.map(|(r, _)| r),
            "row",
        )?;
        let cols = Self::partition(
            self.ncols,
            self.col_displs,
            self.grid.map(|(_, c)| c),
            "column",
        )?;
        let max_nb_ops = self.max_nb_ops.unwrap_or(config.max_nb_ops);
        anyhow::ensure!(max_nb_ops > 0, "the non-blocking flush threshold must be at least 1");
        let sb_dim_max = self.sb_dim_max.unwrap_or(config.sb_dim_max);
        let lock_type = self.lock_type.unwrap_or_default();

        let ld_local = cols.max_block_len();
        let geometry = Arc::new(Geometry::new(rows, cols));
        let num_pes = geometry.num_pes();
        let region_lens = (0..num_pes)
            .map(|pe| geometry.tile(pe).row_num * ld_local)
            .collect::<Vec<_>>();
        let window = ShmemWindow::<T>::new(&region_lens);
        let cache = Arc::new(DatatypeCache::new(sb_dim_max, ld_local));
        debug!(
            "building {}x{} matrix over {:?} pes, ld_local {}, small blocks up to {}",
            geometry.nrows(),
            geometry.ncols(),
            num_pes,
            ld_local,
            cache.dim_max()
        );

        Ok((0..num_pes)
            .map(|pe| TiledMatrix {
                geometry: geometry.clone(),
                ld_local,
                comm: window.comm(pe),
                encoder: TransferEncoder::new(cache.clone(), ld_local),
                lock_types: vec![lock_type; num_pes],
                nb_ops: vec![0; num_pes],
                nb_total: 0,
                max_nb_ops,
                queues: (0..num_pes).map(|_| RequestQueue::default()).collect(),
                batch: BatchState::Idle,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_single_tile() {
        let handles = MatrixBuilder::<f32>::new(3, 5).build().unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].proc_grid(), (1, 1));
        assert_eq!(handles[0].ld_local(), 5);
        assert_eq!(handles[0].local_tile().unwrap(), vec![0.0; 15]);
    }

    #[test]
    fn uneven_columns_use_widest_stride() {
        let handles = MatrixBuilder::<u32>::new(4, 7)
            .col_displs(vec![0, 2, 7])
            .build()
            .unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[1].ld_local(), 5);
        assert_eq!(handles[0].tile_bounds(0).unwrap().col_num, 2);
        // the narrow tile still exposes rows of ld_local elements
        assert_eq!(handles[0].comm.window.num_pes(), 2);
        assert_eq!(handles[0].local_tile().unwrap().len(), 8);
    }

    #[test]
    fn rejects_inconsistent_layouts() {
        assert!(MatrixBuilder::<f64>::new(0, 4).build().is_err());
        assert!(MatrixBuilder::<f64>::new(2, 4).proc_grid(3, 1).build().is_err());
        assert!(MatrixBuilder::<f64>::new(4, 4).proc_grid(0, 1).build().is_err());
        assert!(MatrixBuilder::<f64>::new(4, 4)
            .row_displs(vec![0, 1, 4])
            .proc_grid(3, 1)
            .build()
            .is_err());
        assert!(MatrixBuilder::<f64>::new(4, 4)
            .col_displs(vec![0, 3, 3, 4])
            .build()
            .is_err());
        assert!(MatrixBuilder::<f64>::new(4, 4)
            .nb_flush_threshold(0)
            .build()
            .is_err());
    }
}
