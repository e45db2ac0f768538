// Seqlog Kernel
//
// Append-only, sequence-numbered record log and its correctness checks.

pub mod config;
pub mod invariants;
pub mod log;
pub mod notify;
pub mod replay;
pub mod stopwatch;
