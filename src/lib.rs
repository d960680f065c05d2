//! Lamellar Matrix provides the update path of a dense matrix tiled over a group of PEs (processing elements).
//!
//! The logical matrix is cut by contiguous row and column blocks into an R x C grid of tiles,
//! each owned by one PE and exposed through the lamellae as a row major region.
//! Any PE can replace or sum an arbitrary rectangular block of the logical matrix, even one that
//! straddles many tiles, with one-sided operations: the owning PEs do not run any matching code.
//!
//! Updates can be issued in three access modes:
//! - blocking ([put_block][TiledMatrix::put_block], [acc_block][TiledMatrix::acc_block]),
//! - non-blocking, throttled by a flush threshold ([put_block_nb][TiledMatrix::put_block_nb], [acc_block_nb][TiledMatrix::acc_block_nb]),
//! - batched, queued per destination and executed later with a single epoch per destination
//!   ([start_batch_put][TiledMatrix::start_batch_put], [add_put_block_request][TiledMatrix::add_put_block_request], [exec_batch_put][TiledMatrix::exec_batch_put], [stop_batch_put][TiledMatrix::stop_batch_put]).
//!
//! Currently a single lamellae exists, an in-process shared memory backend where every PE is a thread
//! holding its own [TiledMatrix] handle.
//!
//! EXAMPLES
//! --------
//!
//! # Accumulating into a matrix from every PE
//! ```
//! use lamellar_matrix::{Block, MatrixBuilder};
//!
//! let handles = MatrixBuilder::<u64>::new(6, 6).proc_grid(3, 2).build().unwrap();
//! let threads = handles
//!     .into_iter()
//!     .map(|mut matrix| {
//!         std::thread::spawn(move || {
//!             let ones = vec![1u64; 36];
//!             matrix.start_batch_acc().unwrap();
//!             matrix.add_acc_block_request(Block::new(0, 6, 0, 6), &ones, 6).unwrap();
//!             matrix.exec_batch_acc().unwrap();
//!             matrix.stop_batch_acc().unwrap();
//!             matrix.sync().unwrap();
//!             let num_pes = matrix.num_pes() as u64;
//!             assert!(matrix.local_tile().unwrap().iter().all(|&x| x == num_pes));
//!         })
//!     })
//!     .collect::<Vec<_>>();
//! for thread in threads {
//!     thread.join().unwrap();
//! }
//! ```
//!
//! # Environment Variables
//! Runtime defaults can be changed through `LAMELLAR_MATRIX_*` environment variables, see [Config].
mod datatype;
mod env_var;
mod lamellae;
mod matrix;
mod warnings;

pub use env_var::{config, Config};
pub use lamellae::{Element, LockType, RdmaError, UpdateOp};
pub use matrix::{
    AccessMode, BatchState, Block, DatatypeStats, MatrixBuilder, MatrixError, MatrixResult,
    TiledMatrix,
};
