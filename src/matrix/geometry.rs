use itertools::iproduct;

use super::error::{MatrixError, MatrixResult};

/// A rectangular block of the logical matrix, `row_num` x `col_num` elements
/// with its upper left corner at (`row_start`, `col_start`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub row_start: usize,
    pub row_num: usize,
    pub col_start: usize,
    pub col_num: usize,
}

impl Block {
    pub fn new(row_start: usize, row_num: usize, col_start: usize, col_num: usize) -> Block {
        Block {
            row_start,
            row_num,
            col_start,
            col_num,
        }
    }

    /// one past the last row
    pub fn row_end(&self) -> usize {
        self.row_start + self.row_num
    }

    /// one past the last column
    pub fn col_end(&self) -> usize {
        self.col_start + self.col_num
    }

    pub fn is_empty(&self) -> bool {
        self.row_num == 0 || self.col_num == 0
    }

    pub fn len(&self) -> usize {
        self.row_num * self.col_num
    }

    pub fn contains(&self, other: &Block) -> bool {
        self.row_start <= other.row_start
            && self.col_start <= other.col_start
            && other.row_end() <= self.row_end()
            && other.col_end() <= self.col_end()
    }

    /// the overlap of the two blocks, if any
    pub fn intersect(&self, other: &Block) -> Option<Block> {
        let row_start = self.row_start.max(other.row_start);
        let row_end = self.row_end().min(other.row_end());
        let col_start = self.col_start.max(other.col_start);
        let col_end = self.col_end().min(other.col_end());
        if row_start < row_end && col_start < col_end {
            Some(Block::new(
                row_start,
                row_end - row_start,
                col_start,
                col_end - col_start,
            ))
        } else {
            None
        }
    }
}

/// Boundary table splitting `0..len` into contiguous, non-empty blocks.
/// `displs[i]` is the first index of block `i`, `displs[num_blocks]` is `len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockPartition {
    displs: Vec<usize>,
}

impl BlockPartition {
    pub(crate) fn even(len: usize, num_blocks: usize) -> anyhow::Result<BlockPartition> {
        anyhow::ensure!(num_blocks > 0, "cannot split {len} into zero blocks");
        BlockPartition::from_displs(
            (0..=num_blocks).map(|i| i * len / num_blocks).collect(),
            len,
        )
    }

    pub(crate) fn from_displs(displs: Vec<usize>, len: usize) -> anyhow::Result<BlockPartition> {
        anyhow::ensure!(
            displs.len() >= 2,
            "a boundary table needs at least two entries, found {:?}",
            displs
        );
        anyhow::ensure!(
            displs[0] == 0 && displs[displs.len() - 1] == len,
            "boundary table {:?} must start at 0 and end at {}",
            displs,
            len
        );
        anyhow::ensure!(
            displs.windows(2).all(|w| w[0] < w[1]),
            "boundary table {:?} must be strictly increasing (every block non-empty)",
            displs
        );
        Ok(BlockPartition { displs })
    }

    pub(crate) fn num_blocks(&self) -> usize {
        self.displs.len() - 1
    }

    pub(crate) fn len(&self) -> usize {
        self.displs[self.displs.len() - 1]
    }

    pub(crate) fn start(&self, block: usize) -> usize {
        self.displs[block]
    }

    pub(crate) fn block_len(&self, block: usize) -> usize {
        self.displs[block + 1] - self.displs[block]
    }

    pub(crate) fn max_block_len(&self) -> usize {
        (0..self.num_blocks())
            .map(|b| self.block_len(b))
            .max()
            .unwrap_or(0)
    }

    /// the block containing `index`, which must be `< len()`
    pub(crate) fn block_of(&self, index: usize) -> usize {
        debug_assert!(index < self.len());
        self.displs.partition_point(|&d| d <= index) - 1
    }
}

/// The part of an update that lands on a single pe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubBlock {
    pub(crate) pe: usize,
    pub(crate) block: Block,
    /// element offset of `block`'s origin within the caller's source buffer
    pub(crate) src_offset: usize,
}

/// The row and column partitions of a matrix over an R x C process grid.
/// The tile at block row `i`, block column `j` belongs to pe `i * C + j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub(crate) rows: BlockPartition,
    pub(crate) cols: BlockPartition,
}

impl Geometry {
    pub(crate) fn new(rows: BlockPartition, cols: BlockPartition) -> Geometry {
        Geometry { rows, cols }
    }

    pub(crate) fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub(crate) fn num_pes(&self) -> usize {
        self.rows.num_blocks() * self.cols.num_blocks()
    }

    pub(crate) fn tile(&self, pe: usize) -> Block {
        let c_blocks = self.cols.num_blocks();
        let (blk_r, blk_c) = (pe / c_blocks, pe % c_blocks);
        Block::new(
            self.rows.start(blk_r),
            self.rows.block_len(blk_r),
            self.cols.start(blk_c),
            self.cols.block_len(blk_c),
        )
    }

    pub(crate) fn owner_of(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.nrows() && col < self.ncols() {
            Some(self.rows.block_of(row) * self.cols.num_blocks() + self.cols.block_of(col))
        } else {
            None
        }
    }

    /// the block must be non-empty and lie within the matrix
    pub(crate) fn validate(&self, block: &Block) -> MatrixResult<()> {
        let in_bounds = block
            .row_start
            .checked_add(block.row_num)
            .zip(block.col_start.checked_add(block.col_num))
            .map_or(false, |(row_end, col_end)| {
                row_end <= self.nrows() && col_end <= self.ncols()
            });
        if block.is_empty() || !in_bounds {
            Err(MatrixError::InvalidBlock(*block))
        } else {
            Ok(())
        }
    }

    /// Split a validated block into the pieces owned by each pe, in pe order.
    /// `src_ld` is the row stride of the caller's buffer holding `block`.
    pub(crate) fn resolve<'a>(
        &'a self,
        block: &'a Block,
        src_ld: usize,
    ) -> impl Iterator<Item = SubBlock> + 'a {
        let s_blk_r = self.rows.block_of(block.row_start);
        let e_blk_r = self.rows.block_of(block.row_end() - 1);
        let s_blk_c = self.cols.block_of(block.col_start);
        let e_blk_c = self.cols.block_of(block.col_end() - 1);
        iproduct!(s_blk_r..=e_blk_r, s_blk_c..=e_blk_c).map(move |(blk_r, blk_c)| {
            let pe = blk_r * self.cols.num_blocks() + blk_c;
            let sub = self.tile(pe).intersect(block).unwrap_or_else(|| {
                panic!(
                    "tile of pe {pe} does not overlap {block:?}, the boundary tables are inconsistent"
                )
            });
            SubBlock {
                pe,
                block: sub,
                src_offset: (sub.row_start - block.row_start) * src_ld
                    + (sub.col_start - block.col_start),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn geometry(nrows: usize, ncols: usize, r: usize, c: usize) -> Geometry {
        Geometry::new(
            BlockPartition::even(nrows, r).unwrap(),
            BlockPartition::even(ncols, c).unwrap(),
        )
    }

    #[test]
    fn even_partition() {
        let p = BlockPartition::even(10, 3).unwrap();
        assert_eq!(p.displs, vec![0, 3, 6, 10]);
        assert_eq!(p.block_of(0), 0);
        assert_eq!(p.block_of(2), 0);
        assert_eq!(p.block_of(3), 1);
        assert_eq!(p.block_of(9), 2);
        assert_eq!(p.max_block_len(), 4);
    }

    #[test]
    fn bad_partitions() {
        assert!(BlockPartition::even(5, 0).is_err());
        assert!(BlockPartition::even(2, 3).is_err());
        assert!(BlockPartition::from_displs(vec![0, 2, 2, 4], 4).is_err());
        assert!(BlockPartition::from_displs(vec![1, 4], 4).is_err());
        assert!(BlockPartition::from_displs(vec![0, 3], 4).is_err());
        assert!(BlockPartition::from_displs(vec![0], 0).is_err());
    }

    #[test]
    fn quadrants_of_4x4() {
        let g = geometry(4, 4, 2, 2);
        let block = Block::new(0, 4, 0, 4);
        let subs = g.resolve(&block, 4).collect::<Vec<_>>();
        assert_eq!(subs.len(), 4);
        assert_eq!(
            subs,
            vec![
                SubBlock {
                    pe: 0,
                    block: Block::new(0, 2, 0, 2),
                    src_offset: 0
                },
                SubBlock {
                    pe: 1,
                    block: Block::new(0, 2, 2, 2),
                    src_offset: 2
                },
                SubBlock {
                    pe: 2,
                    block: Block::new(2, 2, 0, 2),
                    src_offset: 8
                },
                SubBlock {
                    pe: 3,
                    block: Block::new(2, 2, 2, 2),
                    src_offset: 10
                },
            ]
        );
    }

    #[test]
    fn single_owner() {
        let g = geometry(9, 7, 3, 2);
        let block = Block::new(4, 1, 5, 2);
        let subs = g.resolve(&block, 2).collect::<Vec<_>>();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].pe, 3);
        assert_eq!(subs[0].block, block);
        assert_eq!(subs[0].src_offset, 0);
        assert_eq!(g.owner_of(4, 5), Some(3));
        assert_eq!(g.owner_of(9, 0), None);
    }

    #[test]
    fn validate_rejects() {
        let g = geometry(4, 6, 2, 3);
        assert!(g.validate(&Block::new(0, 4, 0, 6)).is_ok());
        for block in [
            Block::new(0, 0, 0, 1),
            Block::new(0, 1, 0, 0),
            Block::new(3, 2, 0, 1),
            Block::new(0, 1, 5, 2),
            Block::new(usize::MAX, 2, 0, 1),
        ] {
            assert_eq!(g.validate(&block), Err(MatrixError::InvalidBlock(block)));
        }
    }

    // the pieces exactly tile the requested block and each one sits in its owner's tile
    #[test]
    fn partition_law_random_blocks() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let nrows = rng.gen_range(1..40);
            let ncols = rng.gen_range(1..40);
            let r = rng.gen_range(1..=nrows.min(5));
            let c = rng.gen_range(1..=ncols.min(5));
            let g = geometry(nrows, ncols, r, c);
            let row_start = rng.gen_range(0..nrows);
            let col_start = rng.gen_range(0..ncols);
            let block = Block::new(
                row_start,
                rng.gen_range(1..=nrows - row_start),
                col_start,
                rng.gen_range(1..=ncols - col_start),
            );
            g.validate(&block).unwrap();
            let src_ld = block.col_num + rng.gen_range(0..3);
            let mut covered = vec![0usize; block.len()];
            for sub in g.resolve(&block, src_ld) {
                assert!(block.contains(&sub.block));
                assert!(g.tile(sub.pe).contains(&sub.block));
                let first = sub.block.row_start - block.row_start;
                let first_col = sub.block.col_start - block.col_start;
                assert_eq!(sub.src_offset, first * src_ld + first_col);
                for row in sub.block.row_start..sub.block.row_end() {
                    for col in sub.block.col_start..sub.block.col_end() {
                        assert_eq!(g.owner_of(row, col), Some(sub.pe));
                        covered[(row - block.row_start) * block.col_num
                            + (col - block.col_start)] += 1;
                    }
                }
            }
            assert!(covered.iter().all(|&c| c == 1), "{block:?} not tiled exactly");
        }
    }
}
