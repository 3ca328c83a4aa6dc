//! Scenario tests for the initializer.
//!
//! Each suite drives an `Initializer` against the recording engine in
//! `support` or the in-process local engine.

mod cases_bootstrap_test;

pub mod support;
