use crate::config;

pub(crate) enum MatrixWarning {
    /// a batch was stopped while `.0` requests were still queued
    DiscardedBatch(usize),
    /// waited `.1` seconds for the epoch on pe `.0`
    EpochWait(usize, f64),
}

impl MatrixWarning {
    fn print_warning(&self) -> bool {
        match self {
            MatrixWarning::DiscardedBatch(cnt) => {
                *cnt > 0 && config().batch_discard_warning.unwrap_or(true)
            }
            MatrixWarning::EpochWait(_, elapsed) => {
                config().epoch_wait_warning.unwrap_or(true)
                    && config().deadlock_timeout > 0.0
                    && *elapsed > config().deadlock_timeout
            }
        }
    }

    pub(crate) fn print(self) {
        if self.print_warning() {
            match self {
                MatrixWarning::DiscardedBatch(cnt) => {
                    tracing::warn!(
                        "[LAMELLAR MATRIX WARNING] stopping a batch update with {cnt} queued request(s) that were never executed, they have been discarded. \
                        Call exec_batch_put/exec_batch_acc before stopping to apply them. Set LAMELLAR_MATRIX_BATCH_DISCARD_WARNING=false to disable this warning."
                    );
                }
                MatrixWarning::EpochWait(pe, elapsed) => {
                    tracing::warn!(
                        "[LAMELLAR MATRIX WARNING][{:?}] waited {elapsed:.1}s for an epoch on pe {pe}. Potential deadlock detected. \
                        Another pe is holding a conflicting (exclusive) epoch, likely with non-blocking updates that were never flushed. \
                        The timeout can be set via LAMELLAR_MATRIX_DEADLOCK_TIMEOUT, the current timeout is {} seconds, setting this to 0 will disable this warning.",
                        std::thread::current().id(),
                        config().deadlock_timeout
                    );
                }
            }
        }
    }
}
