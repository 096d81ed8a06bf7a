//! Declarative flow structure
//!
//! A [`Manifest`] groups the flows and proxy flows produced by whatever loads
//! flow definitions. Only the dependency structure lives here; the executable
//! bodies of the nodes are attached when a [`Flow`](crate::executor::Flow) is
//! built.

use super::error::GraphResult;
use super::resolver::{resolve, DependsOn, Dependent};
use super::NodeId;
use serde::{Deserialize, Serialize};

/// Dependency declaration of a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique id of the node within its flow
    pub id: NodeId,
    /// Predecessor ids and their resolved arena index
    #[serde(default)]
    pub depends_on: DependsOn,
}

impl NodeSpec {
    /// Creates a root node declaration
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            depends_on: DependsOn::new(),
        }
    }

    /// Adds unresolved dependencies
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        for dependency in dependencies {
            self.depends_on.insert(dependency.into(), None);
        }
        self
    }
}

impl Dependent for NodeSpec {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn depends_on(&self) -> &DependsOn {
        &self.depends_on
    }

    fn depends_on_mut(&mut self) -> &mut DependsOn {
        &mut self.depends_on
    }
}

/// Dependency structure of one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl FlowSpec {
    pub fn new(name: impl Into<String>, nodes: Vec<NodeSpec>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    /// Returns the node declaration with the given id
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.id.as_str() == id)
    }
}

/// Collection of flows and proxy (forwarding) flows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
    #[serde(default)]
    pub proxies: Vec<FlowSpec>,
}

/// Resolves the dependencies of every flow and proxy in the manifest.
///
/// Each flow is resolved in isolation: identical node ids in different flows
/// never resolve against each other.
pub fn resolve_manifest(manifest: &mut Manifest) -> GraphResult<()> {
    for flow in manifest.flows.iter_mut().chain(manifest.proxies.iter_mut()) {
        resolve(&flow.name, &mut flow.nodes)?;
    }

    Ok(())
}
