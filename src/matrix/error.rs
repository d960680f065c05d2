use super::geometry::Block;
use crate::lamellae::RdmaError;

/// Errors returned by the update operations of a [TiledMatrix][crate::TiledMatrix]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// the block is empty or reaches outside of the matrix (or of the destination tile)
    InvalidBlock(Block),
    /// the source buffer is too short to hold the block at the given stride
    InvalidBuffer { required: usize, len: usize },
    /// the source stride is smaller than the number of columns in the block
    InvalidStride { src_ld: usize, col_num: usize },
    /// a batched get is in progress
    AlreadyBatchedGet,
    /// a batched put is in progress
    AlreadyBatchedPut,
    /// a batched accumulate is in progress
    AlreadyBatchedAcc,
    /// no batched get is in progress
    NoBatchedGet,
    /// no batched put is in progress
    NoBatchedPut,
    /// no batched accumulate is in progress
    NoBatchedAcc,
    /// the one-sided transfer failed
    Rdma(RdmaError),
}

impl std::fmt::Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MatrixError::InvalidBlock(block) => {
                write!(
                    f,
                    "invalid block: rows {}..{} cols {}..{}",
                    block.row_start,
                    block.row_start.saturating_add(block.row_num),
                    block.col_start,
                    block.col_start.saturating_add(block.col_num)
                )
            }
            MatrixError::InvalidBuffer { required, len } => {
                write!(
                    f,
                    "source buffer holds {} elements but the block needs {}",
                    len, required
                )
            }
            MatrixError::InvalidStride { src_ld, col_num } => {
                write!(
                    f,
                    "source stride {} is smaller than the {} columns of the block",
                    src_ld, col_num
                )
            }
            MatrixError::AlreadyBatchedGet => write!(f, "a batched get is already active"),
            MatrixError::AlreadyBatchedPut => write!(f, "a batched put is already active"),
            MatrixError::AlreadyBatchedAcc => {
                write!(f, "a batched accumulate is already active")
            }
            MatrixError::NoBatchedGet => write!(f, "no batched get is active"),
            MatrixError::NoBatchedPut => write!(f, "no batched put is active"),
            MatrixError::NoBatchedAcc => write!(f, "no batched accumulate is active"),
            MatrixError::Rdma(err) => write!(f, "one-sided transfer failed: {}", err),
        }
    }
}

impl std::error::Error for MatrixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatrixError::Rdma(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RdmaError> for MatrixError {
    fn from(err: RdmaError) -> Self {
        MatrixError::Rdma(err)
    }
}

pub type MatrixResult<T> = Result<T, MatrixError>;
