//! Background services
//!
//! Runs as a background tokio task that sweeps active procedures on a fixed
//! interval: end-grace closures and idle expiry.

pub mod reaper;

pub use reaper::{ProcedureReaper, ReaperStats};
