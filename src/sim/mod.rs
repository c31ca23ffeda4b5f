
// Simulation driver: random burst traffic, a remote report sink thread,
// and the clock loop that ties them to the transmit core.

pub mod stimulus;
pub mod sink;
pub mod runner;
