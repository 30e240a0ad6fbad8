//! Document loader

use crate::error::{FlowError, Result};
use crate::model::ContainerDocument;
use crate::parser::parse_kdl_string;
use std::path::Path;
use tracing::{info, instrument};

/// Load and parse a container document from disk
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_document(path: impl AsRef<Path>) -> Result<ContainerDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| FlowError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let document = load_document_from_str(&content)?;
    info!(containers = document.len(), "Container document loaded");
    Ok(document)
}

/// Parse a container document held in memory
pub fn load_document_from_str(content: &str) -> Result<ContainerDocument> {
    parse_kdl_string(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_document_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("container.kdl");
        fs::write(
            &path,
            r#"
            container "api" {
                memory 256
                image { url "cr.yandex/crp/api:1.0"; }
            }
            "#,
        )
        .unwrap();

        let document = load_document(&path).unwrap();
        assert_eq!(document.get("api").unwrap().memory, 256);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_document(temp_dir.path().join("missing.kdl"));
        assert!(matches!(result, Err(FlowError::IoError { .. })));
    }
}
