//! Container document: every container declared in one KDL file

use super::DesiredConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All containers declared in a document, keyed by their resource key
/// (the argument of the `container` node).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDocument {
    pub containers: BTreeMap<String, DesiredConfig>,
}

impl ContainerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&DesiredConfig> {
        self.containers.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.containers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DesiredConfig)> {
        self.containers.iter()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
