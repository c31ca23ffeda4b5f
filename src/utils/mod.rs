
// Run metrics and CSV export for the simulation driver.

pub mod metrics;
pub mod export;
