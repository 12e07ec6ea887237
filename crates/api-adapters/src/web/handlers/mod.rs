//! # Handlers
//!
//! Thin adapters from HTTP to the services: extract, call, wrap the result
//! in `{ "ok": true, ... }`.

pub mod accounts;
pub mod ai;
pub mod feed;
pub mod media;
pub mod system;
