//! Functional core of strata.
//!
//! Pure data types and functions plus the traits that mark every I/O seam.
//! Nothing in this crate talks to a network, a disk or a clock-driven task;
//! the `strata` crate provides the adapters.

pub mod bus;
pub mod cache;
pub mod events;
pub mod object_store;
pub mod snapshot;
pub mod storage;
