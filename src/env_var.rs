use std::sync::OnceLock;

use serde::Deserialize;

use crate::lamellae::LockType;

fn default_deadlock_timeout() -> f64 {
    600.0
}

fn default_sb_dim_max() -> usize {
    16
}

fn default_max_nb_ops() -> usize {
    16
}

fn default_acc_lock() -> LockType {
    LockType::Shared
}

#[derive(Deserialize, Debug)]
pub struct Config {
    /// A timeout in seconds after which waiting on a destination epoch is reported as a potential deadlock, default: 600.0 seconds
    #[serde(default = "default_deadlock_timeout")]
    pub deadlock_timeout: f64,

    /// Largest row/column count covered by the precomputed small block datatypes, default: 16
    #[serde(default = "default_sb_dim_max")]
    pub sb_dim_max: usize,

    /// Number of outstanding non-blocking updates that forces a flush, default: 16
    #[serde(default = "default_max_nb_ops")]
    pub max_nb_ops: usize,

    /// Lock type used when opening an epoch on a destination for updates
    /// exclusive -- one origin at a time
    /// shared -- concurrent origins, accumulates stay element atomic (default)
    #[serde(default = "default_acc_lock")]
    pub acc_lock: LockType,

    /// flag used to print a warning when a batch is stopped with requests still queued. Default: true
    pub batch_discard_warning: Option<bool>,

    /// flag used to print a warning when an epoch wait exceeds the deadlock timeout. Default: true
    pub epoch_wait_warning: Option<bool>,
}

/// Get the current Environment Variable configuration
pub fn config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(
        || match envy::prefixed("LAMELLAR_MATRIX_").from_env::<Config>() {
            Ok(config) => config,
            Err(error) => panic!("{}", error),
        },
    )
}
