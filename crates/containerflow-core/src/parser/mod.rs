//! KDL parser
//!
//! Parses ContainerFlow KDL documents. Each top-level `container` node
//! describes one serverless container; other top-level nodes are ignored.

mod container;
mod values;

pub use container::parse_container;

use crate::error::{FlowError, Result};
use crate::model::ContainerDocument;
use kdl::KdlDocument;

/// Parse a KDL string into a container document
pub fn parse_kdl_string(content: &str) -> Result<ContainerDocument> {
    let doc: KdlDocument = content.parse()?;
    let mut document = ContainerDocument::new();

    for node in doc.nodes() {
        match node.name().value() {
            "container" => {
                let (key, config) = parse_container(node)?;
                if document.containers.contains_key(&key) {
                    return Err(FlowError::DuplicateContainer(key));
                }
                document.containers.insert(key, config);
            }
            other => {
                tracing::debug!(node = other, "Skipping unknown top-level node");
            }
        }
    }

    Ok(document)
}
