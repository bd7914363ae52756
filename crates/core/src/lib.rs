//! Lofi Maker core
//!
//! Domain types and the offline transform pipeline that turns a clean
//! recording into a degraded "lofi" variant. Decoding, encoding and
//! time-scale modification are reached through traits implemented by
//! the `infra` crate.

pub mod domain;

pub use domain::*;
