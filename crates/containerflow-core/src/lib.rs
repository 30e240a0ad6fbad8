//! ContainerFlow core
//!
//! Desired-state model for serverless containers and the KDL document
//! loader that produces it.

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;

pub use error::{FlowError, Result};
pub use loader::{load_document, load_document_from_str};
pub use model::*;
pub use parser::{parse_container, parse_kdl_string};
