//! Library surface for `groundctl`: the binary in `main.rs` is a thin
//! wrapper that wires these modules together (spec.md §1/§5). Exposed as a
//! library mainly so integration tests can exercise the Schedule Builder
//! across modules the way `tests/schedule.rs` does.

pub mod capture;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod ephemeris;
pub mod observer;
pub mod rotator;
pub mod schedule;
pub mod tracker;
pub mod utils;
