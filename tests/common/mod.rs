#![allow(dead_code)]
use lamellar_matrix::{Element, MatrixBuilder, TiledMatrix};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Build the matrix and run `f` on every pe, each on its own thread.
/// Results are returned in rank order.
pub fn run_on_pes<T, R, F>(builder: MatrixBuilder<T>, f: F) -> Vec<R>
where
    T: Element,
    R: Send,
    F: Fn(&mut TiledMatrix<T>) -> R + Sync,
{
    init_tracing();
    let handles = builder.build().expect("valid matrix layout");
    std::thread::scope(|s| {
        let threads = handles
            .into_iter()
            .map(|mut matrix| {
                let f = &f;
                s.spawn(move || f(&mut matrix))
            })
            .collect::<Vec<_>>();
        threads
            .into_iter()
            .map(|t| t.join().expect("pe thread panicked"))
            .collect()
    })
}

/// Read the whole logical matrix, row major, from the tiles of every pe
pub fn gather<T: Element>(matrix: &TiledMatrix<T>) -> Vec<T> {
    let ncols = matrix.ncols();
    let mut out = vec![T::default(); matrix.nrows() * ncols];
    for pe in 0..matrix.num_pes() {
        let tile = matrix.tile_bounds(pe).expect("pe in range");
        let data = matrix.tile_snapshot(pe).expect("pe in range");
        for (r, row) in data.chunks(tile.col_num).enumerate() {
            let start = (tile.row_start + r) * ncols + tile.col_start;
            out[start..start + tile.col_num].copy_from_slice(row);
        }
    }
    out
}

/// a row major buffer of `rows` x `ld` small nonzero values that vary with row and column
pub fn pattern<T: Element + From<u8>>(rows: usize, ld: usize) -> Vec<T> {
    (0..rows * ld)
        .map(|i| T::from(((i / ld * 7 + i % ld + 1) % 97) as u8))
        .collect()
}
