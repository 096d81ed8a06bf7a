//! Dependency resolution
//!
//! Nodes declare their predecessors by id. Before a flow can run, every declared
//! id is replaced by the arena index of the node it names. The resolver walks
//! the declarations depth-first, threading a "currently resolving" set through
//! the recursion, which is how cycles are detected: a node that is reached again
//! while its own dependencies are still open closes a cycle.
//!
//! Resolution works on a scratch copy of the placeholders and writes back only
//! once the whole flow resolved, so a failing flow is never left half resolved.

use super::error::{GraphError, GraphResult};
use super::{NodeId, NodeIndex};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

/// Declared dependencies of a node: predecessor id to resolved arena index.
///
/// `None` is the placeholder of a dependency that has not been resolved yet.
pub type DependsOn = BTreeMap<NodeId, Option<NodeIndex>>;

/// Anything that carries an id and a dependency declaration
pub trait Dependent {
    /// Returns the id of the node
    fn id(&self) -> &NodeId;

    /// Returns the declared dependencies
    fn depends_on(&self) -> &DependsOn;

    /// Returns the declared dependencies for resolution
    fn depends_on_mut(&mut self) -> &mut DependsOn;
}

/// Resolves the dependencies of every node in `nodes`.
///
/// Self dependencies are pruned without error. Resolving an already resolved
/// set of nodes is a no-op.
///
/// # Errors
///
/// - [`GraphError::DuplicateNode`] if two nodes share an id
/// - [`GraphError::DependencyNotFound`] if a dependency names an unknown id
/// - [`GraphError::CircularDependency`] if the dependencies form a cycle
pub fn resolve<T: Dependent>(flow: &str, nodes: &mut [T]) -> GraphResult<()> {
    let mut lookup = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        if lookup.insert(node.id().clone(), index).is_some() {
            return Err(GraphError::duplicate_node(flow, node.id().clone()));
        }
    }

    let mut resolver = Resolver {
        flow,
        ids: nodes.iter().map(|node| node.id().clone()).collect(),
        lookup,
        scratch: nodes.iter().map(|node| node.depends_on().clone()).collect(),
        resolving: HashSet::new(),
    };

    for index in 0..nodes.len() {
        resolver.resolve_node(index)?;
    }

    for (node, depends_on) in nodes.iter_mut().zip(resolver.scratch) {
        *node.depends_on_mut() = depends_on;
    }

    Ok(())
}

/// Returns true when every dependency placeholder of `node` has been resolved
pub fn is_resolved<T: Dependent>(node: &T) -> bool {
    node.depends_on().values().all(Option::is_some)
}

struct Resolver<'a> {
    flow: &'a str,
    ids: Vec<NodeId>,
    lookup: HashMap<NodeId, NodeIndex>,
    scratch: Vec<DependsOn>,
    resolving: HashSet<NodeIndex>,
}

impl Resolver<'_> {
    fn resolve_node(&mut self, index: NodeIndex) -> GraphResult<()> {
        let id = self.ids[index].clone();

        if self.scratch[index].remove(&id).is_some() {
            trace!(flow = self.flow, node = %id, "pruned self dependency");
        }

        let pending: Vec<NodeId> = self.scratch[index]
            .iter()
            .filter(|(_, handle)| handle.is_none())
            .map(|(dependency, _)| dependency.clone())
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        if !self.resolving.insert(index) {
            return Err(GraphError::circular(self.flow, id));
        }

        for dependency in pending {
            let target = match self.lookup.get(&dependency) {
                Some(target) => *target,
                None => {
                    return Err(GraphError::dependency_not_found(
                        self.flow,
                        id,
                        dependency,
                    ))
                }
            };

            self.resolve_node(target)?;
            self.scratch[index].insert(dependency, Some(target));
        }

        self.resolving.remove(&index);
        Ok(())
    }
}
