//! Helpers for reading KDL entry values

use crate::error::{FlowError, Result};
use kdl::KdlNode;
use std::collections::BTreeMap;

pub(super) fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(super) fn all_strings(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

pub(super) fn first_bool(node: &KdlNode) -> Option<bool> {
    node.entries().first().and_then(|e| e.value().as_bool())
}

/// Read the first entry as a non-negative integer
pub(super) fn first_unsigned(container: &str, node: &KdlNode) -> Result<u64> {
    let field = node.name().value();
    let value = node
        .entries()
        .first()
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| invalid(container, field, "requires an integer value"))?;

    u64::try_from(value).map_err(|_| invalid(container, field, "must not be negative"))
}

pub(super) fn required_string(container: &str, node: &KdlNode) -> Result<String> {
    first_string(node)
        .ok_or_else(|| invalid(container, node.name().value(), "requires a string value"))
}

/// Read `key "value"` children as a string map
pub(super) fn string_map(node: &KdlNode) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value().to_string();
            if let Some(value) = first_string(child) {
                map.insert(key, value);
            }
        }
    }
    map
}

pub(super) fn invalid(container: &str, field: &str, message: &str) -> FlowError {
    FlowError::InvalidField {
        container: container.to_string(),
        field: field.to_string(),
        message: message.to_string(),
    }
}
