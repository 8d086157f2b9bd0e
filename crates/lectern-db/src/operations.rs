//! Database operations.

pub mod units;
