//! Resilience patterns for coordinating concurrent work
//!
//! This module provides **generic, reusable** coordination primitives:
//! - **Single-flight**: collapses concurrent calls to the same operation into
//!   one in-flight future whose result every caller shares
//!
//! The primitives are runtime-agnostic (no tokio dependency) and safe to use
//! from multi-threaded executors.

pub mod single_flight;

pub use single_flight::{Flight, SingleFlight};
