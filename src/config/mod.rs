
// Configuration store: the small register file the core owns.
// Idle filler value, error policy and the error-report destination,
// read and written only through control requests.

pub mod registers;
