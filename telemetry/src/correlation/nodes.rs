//! Known nodes and their display names.

use std::collections::HashMap;

use crate::feed::NodeId;

/// Mapping from feed node id to node display name.
///
/// Entries live for as long as the feed reports the node as connected.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    names: HashMap<NodeId, String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, overwriting the name of an id that is already known.
    pub fn insert(&mut self, id: NodeId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Removes a node and returns its name, if it was known.
    pub fn remove(&mut self, id: &NodeId) -> Option<String> {
        self.names.remove(id)
    }

    /// Returns the display name of `id`, or `""` for an unknown node.
    pub fn name_of(&self, id: &NodeId) -> &str {
        self.names.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.names.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}
