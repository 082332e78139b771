//! # API Module
//!
//! HTTP surface: route configuration and request handlers.

pub mod handlers;
pub mod routes;

pub use routes::configure_routes;
