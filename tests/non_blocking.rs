mod common;

use common::{gather, run_on_pes};
use lamellar_matrix::{AccessMode, Block, LockType, MatrixBuilder, UpdateOp};

#[test]
fn threshold_flush_resets_counters() {
    let results = run_on_pes(
        MatrixBuilder::<f64>::new(4, 4)
            .proc_grid(2, 2)
            .nb_flush_threshold(3),
        |matrix| {
            if matrix.my_pe() == 0 {
                matrix.put_block_nb(Block::new(0, 1, 0, 1), &[5.0], 1).unwrap();
                assert_eq!(matrix.outstanding(), 1);
                assert_eq!(matrix.outstanding_to(0), Some(1));
                assert_eq!(matrix.held_epochs(), 1);
                assert!(matrix.epoch_open_on(0));

                matrix.put_block_nb(Block::new(0, 1, 3, 1), &[7.0], 1).unwrap();
                assert_eq!(matrix.outstanding(), 2);
                assert_eq!(matrix.outstanding_to(1), Some(1));
                assert_eq!(matrix.held_epochs(), 2);

                // the third operation reaches the threshold and flushes everything
                matrix.put_block_nb(Block::new(3, 1, 0, 1), &[9.0], 1).unwrap();
                assert_eq!(matrix.outstanding(), 0);
                for pe in 0..matrix.num_pes() {
                    assert_eq!(matrix.outstanding_to(pe), Some(0));
                    assert!(!matrix.epoch_open_on(pe));
                }
                assert_eq!(matrix.held_epochs(), 0);
            }
            matrix.sync().unwrap();
            gather(matrix)
        },
    );
    for full in results {
        assert_eq!(full[0], 5.0);
        assert_eq!(full[3], 7.0);
        assert_eq!(full[12], 9.0);
        assert_eq!(full.iter().filter(|&&x| x != 0.0).count(), 3);
    }
}

#[test]
fn flush_inside_a_multi_pe_update() {
    let ones = vec![1u32; 16];
    let results = run_on_pes(
        MatrixBuilder::<u32>::new(4, 4)
            .proc_grid(2, 2)
            .nb_flush_threshold(3),
        |matrix| {
            if matrix.my_pe() == 0 {
                matrix.acc_block_nb(Block::new(0, 1, 0, 1), &[1], 1).unwrap();
                matrix.acc_block_nb(Block::new(0, 1, 2, 1), &[1], 1).unwrap();
                // pieces to pe 0 (flush at 3), then pe 1, 2, 3 (flush at 3 again)
                matrix.acc_block_nb(Block::new(0, 4, 0, 4), &ones, 4).unwrap();
                assert_eq!(matrix.outstanding(), 0);
                assert_eq!(matrix.held_epochs(), 0);
            }
            matrix.sync().unwrap();
            gather(matrix)
        },
    );
    for full in results {
        let mut expected = vec![1u32; 16];
        expected[0] = 2;
        expected[2] = 2;
        assert_eq!(full, expected);
    }
}

#[test]
fn wait_nb_completes_outstanding() {
    let mut matrix = MatrixBuilder::<i64>::new(3, 3)
        .nb_flush_threshold(100)
        .build()
        .unwrap()
        .pop()
        .unwrap();
    let src = vec![2i64; 9];
    for _ in 0..5 {
        matrix
            .update_block(
                UpdateOp::Sum,
                Block::new(0, 3, 0, 3),
                &src,
                3,
                AccessMode::NonBlocking,
            )
            .unwrap();
    }
    assert_eq!(matrix.outstanding(), 5);
    assert!(matrix.epoch_open_on(0));
    matrix.wait_nb().unwrap();
    assert_eq!(matrix.outstanding(), 0);
    assert!(!matrix.epoch_open_on(0));
    assert_eq!(matrix.local_tile().unwrap(), vec![10; 9]);
    // flushing with nothing outstanding is a no-op
    matrix.wait_nb().unwrap();
}

#[test]
fn blocking_update_flushes_first() {
    let mut matrix = MatrixBuilder::<f32>::new(2, 2)
        .lock_type(LockType::Exclusive)
        .build()
        .unwrap()
        .pop()
        .unwrap();
    matrix.put_block_nb(Block::new(0, 2, 0, 2), &[1.0; 4], 2).unwrap();
    assert_eq!(matrix.held_epochs(), 1);
    // would self deadlock on the exclusive epoch without the flush
    matrix.acc_block(Block::new(0, 2, 0, 2), &[1.0; 4], 2).unwrap();
    assert_eq!(matrix.outstanding(), 0);
    assert_eq!(matrix.held_epochs(), 0);
    assert_eq!(matrix.local_tile().unwrap(), vec![2.0; 4]);
}

#[test]
fn dropping_a_handle_releases_its_epochs() {
    let mut handles = MatrixBuilder::<u64>::new(2, 2)
        .proc_grid(1, 2)
        .lock_type(LockType::Exclusive)
        .build()
        .unwrap();
    let mut pe1 = handles.pop().unwrap();
    let mut pe0 = handles.pop().unwrap();
    pe1.put_block_nb(Block::new(0, 2, 0, 1), &[4, 4], 1).unwrap();
    assert!(pe0.epoch_open_on(0));
    drop(pe1);
    assert!(!pe0.epoch_open_on(0));
    pe0.acc_block(Block::new(0, 1, 0, 1), &[1], 1).unwrap();
    assert_eq!(pe0.local_tile().unwrap(), vec![5, 4]);
}

#[test]
fn exclusive_non_blocking_from_every_pe() {
    let ones = vec![1usize; 6 * 9];
    let results = run_on_pes(
        MatrixBuilder::<usize>::new(6, 9)
            .proc_grid(2, 3)
            .lock_type(LockType::Exclusive)
            .nb_flush_threshold(4),
        |matrix| {
            for i in 0..12 {
                // sweep overlapping bands so every pe contends for every destination
                let row = i % 4;
                matrix
                    .acc_block_nb(Block::new(row, 3, 0, 9), &ones, 9)
                    .unwrap();
            }
            matrix.sync().unwrap();
            assert_eq!(matrix.held_epochs(), 0);
            gather(matrix)
        },
    );
    let mut per_pe = vec![0usize; 6 * 9];
    for i in 0..12 {
        let row = i % 4;
        for r in row..row + 3 {
            for c in 0..9 {
                per_pe[r * 9 + c] += 1;
            }
        }
    }
    let expected = per_pe.iter().map(|x| x * 6).collect::<Vec<_>>();
    for full in results {
        assert_eq!(full, expected);
    }
}
