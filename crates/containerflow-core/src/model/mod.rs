//! Model definitions
//!
//! Declared (desired) state of serverless containers.

mod container;
mod document;

pub use container::*;
pub use document::*;
