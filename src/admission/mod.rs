
// Admission: packet intake and release to the fixed-rate consumer.
// Holds packets at the input boundary until their deadline resolves,
// streams them on consumer pulls, and raises late/underrun faults.

pub mod stream;
pub mod controller;
