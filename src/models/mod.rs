//! # API Models
//!
//! Request and response body structures for the HTTP surface.
//! Everything uses camelCase on the wire.

pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;
