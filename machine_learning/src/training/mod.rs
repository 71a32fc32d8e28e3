mod epoch;

pub use epoch::{EpochStats, run_epoch};
