//! Node value object
//!
//! A `Node` is a snapshot: mutate its attributes freely, then hand it to
//! [`GraphStore::save_node`](crate::graph::GraphStore::save_node) to persist
//! the change and refresh every embedded copy.

use super::property::{AttributeMap, Value};
use super::types::NodeIdentity;
use serde::{Deserialize, Serialize};

/// A node in the property graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    node_type: String,
    key: String,

    /// Attributes associated with this node
    pub attributes: AttributeMap,
}

impl Node {
    pub fn new(node_type: impl Into<String>, key: impl Into<String>, attributes: AttributeMap) -> Self {
        Node {
            node_type: node_type.into(),
            key: key.into(),
            attributes,
        }
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.node_type.clone(), self.key.clone())
    }

    /// Row key for this node in the relationship families
    pub fn endpoint_key(&self) -> String {
        super::types::endpoint_key(&self.node_type, &self.key)
    }

    /// Whether this node has the given type and key
    pub fn is(&self, node_type: &str, key: &str) -> bool {
        self.node_type == node_type && self.key == key
    }

    /// Set an attribute value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
}
