
// Reporting: fault queue and the three-write notification protocol
// that delivers each fault to the configured remote register target.

pub mod error_queue;
pub mod reporter;
pub mod target;
pub mod assembler;
