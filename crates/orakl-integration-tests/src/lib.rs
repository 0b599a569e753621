//! Integration test crate for Orakl.
//!
//! This crate has no library code. It only contains integration tests
//! that exercise end-to-end flows across multiple workspace crates:
//!
//! - `aggregator_flow`: oracles report to an aggregator read through a proxy,
//!   including an aggregator swap
//! - `reporting_flow`: queued jobs travel through the stale round guard and
//!   the reporting pipeline into an aggregator
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p orakl-integration-tests
//! ```
