//! # api-adapters
//!
//! The HTTP surface of Kashaaf. With `web-axum` enabled, [`web::router`]
//! builds the axum `Router` over the services in [`web::AppState`].

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod web;

pub use metrics::Metrics;
