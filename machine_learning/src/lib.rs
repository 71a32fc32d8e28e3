pub mod arch;
pub mod data;
pub mod early_stopping;
pub mod error;
pub mod metrics;
pub mod optimization;
pub mod schedule;
pub mod subset;
pub mod training;

pub use error::{MlErr, Result};
