//! # domains
//!
//! Entities, error types and port traits for Kashaaf.
//!
//! Nothing in this crate performs I/O. Adapters implement the traits in
//! [`ports`]; services depend only on those traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::*;
pub use models::*;
pub use ports::*;
