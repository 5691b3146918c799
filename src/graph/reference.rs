//! Type index through reference nodes
//!
//! Each node type has a reference node `(reference, <type>)` with an outgoing
//! `instance` relationship to every node created through
//! [`GraphStore::create_node`]. All reference nodes hang off the root
//! reference node `(reference, reference)`, which is its own parent.

use super::node::Node;
use super::property::AttributeMap;
use super::relationship::Relationship;
use super::store::{GraphError, GraphResult, GraphStore};
use super::types::{INSTANCE_RELATIONSHIP, REFERENCE_TYPE, ROOT_REFERENCE};
use crate::backend::Backend;
use tracing::debug;

impl<B: Backend> GraphStore<B> {
    /// Reference node for `name`, created and linked to the root on first use
    pub fn reference_node(&self, name: &str) -> GraphResult<Node> {
        if let Some(node) = self.find_reference(name)? {
            return Ok(node);
        }

        debug!("Bootstrapping reference node {}", name);
        self.batch(|store| {
            let node = store.create_reference_node(
                REFERENCE_TYPE,
                name,
                crate::attrs! { REFERENCE_TYPE => REFERENCE_TYPE },
            )?;
            // The root is its own parent; any other name resolves the root,
            // which bottoms out in the branch above.
            let root = if name == ROOT_REFERENCE {
                node.clone()
            } else {
                store.root_reference_node()?
            };
            store.create_relationship(
                INSTANCE_RELATIONSHIP,
                &root,
                &node,
                Some(&format!("reference_{}", name)),
                AttributeMap::new(),
            )?;
            Ok(node)
        })
    }

    pub fn root_reference_node(&self) -> GraphResult<Node> {
        self.reference_node(ROOT_REFERENCE)
    }

    /// Link `node` to `reference` with an `instance` relationship keyed `key`
    pub fn instance(&self, reference: &Node, node: &Node, key: &str) -> GraphResult<Relationship> {
        self.create_relationship(INSTANCE_RELATIONSHIP, reference, node, Some(key), AttributeMap::new())
    }

    /// Nodes indexed under the reference node for `node_type`, at most `count`.
    ///
    /// Attributes come from the embedded copies on the instance records.
    pub fn instances_of(&self, node_type: &str, count: usize) -> GraphResult<Vec<Node>> {
        let reference = match self.find_reference(node_type)? {
            Some(reference) => reference,
            None => return Ok(Vec::new()),
        };
        Ok(self
            .get_outgoing_by_type(&reference, INSTANCE_RELATIONSHIP, count)?
            .into_iter()
            .map(|relationship| relationship.target)
            .collect())
    }

    fn find_reference(&self, name: &str) -> GraphResult<Option<Node>> {
        match self.get_node(REFERENCE_TYPE, name) {
            Ok(node) => Ok(Some(node)),
            Err(GraphError::NodeNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
