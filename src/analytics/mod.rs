//! Read-only analytics over the store's winning records

pub mod intervals;

pub use intervals::{all_intervals, compute_intervals, split_producers, winning_years};
