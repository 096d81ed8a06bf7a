//! Flow manager
//!
//! A [`Flow`] owns the node arena of one resolved flow. It is built once and
//! invoked any number of times; each invocation gets its own tracker, its own
//! pending work counters and its own reference store.
//!
//! # Example
//!
//! ```
//! use switchyard::executor::{Caller, CallerOptions, Flow, Node};
//! use switchyard::store::ReferenceStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let flow = Flow::new(
//!     "checkout",
//!     vec![
//!         Node::new("user").with_call(Caller::new("user", CallerOptions::default())),
//!         Node::new("charge")
//!             .depends_on(["user"])
//!             .with_call(Caller::new("charge", CallerOptions::default())),
//!     ],
//! )?;
//!
//! flow.invoke(Arc::new(ReferenceStore::new())).await?;
//! # Ok(())
//! # }
//! ```

use super::error::{FlowError, HookPhase};
use super::middleware::{FlowMiddleware, NodeMiddleware};
use super::node::{Invocation, Node};
use super::processes::Processes;
use super::tracker::{Pass, Signal, Tracker};
use crate::core::BoxError;
use crate::graph::{resolve, GraphError, GraphResult, NodeId, NodeIndex};
use crate::store::Store;
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument, Span};
use uuid::Uuid;

/// A resolved flow, ready to be invoked
pub struct Flow {
    name: String,
    nodes: Arc<[Node]>,
    lookup: HashMap<NodeId, NodeIndex>,
    roots: Vec<NodeIndex>,
    sinks: Vec<NodeIndex>,
    middleware: Option<Arc<dyn FlowMiddleware>>,
    node_middleware: Option<Arc<dyn NodeMiddleware>>,
}

impl Flow {
    /// Resolves the dependencies of `nodes` and links them into a flow
    pub fn new(name: impl Into<String>, mut nodes: Vec<Node>) -> GraphResult<Self> {
        let name = name.into();
        if nodes.is_empty() {
            return Err(GraphError::empty_flow(name));
        }

        resolve(&name, &mut nodes)?;

        let mut edges = Vec::new();
        for (index, node) in nodes.iter_mut().enumerate() {
            node.set_index(index);
            edges.extend(node.dependencies().values().flatten().map(|&from| (from, index)));
        }

        for (from, to) in edges {
            nodes[from].next.push(to);
            nodes[to].previous.push(from);
        }

        let lookup = nodes
            .iter()
            .map(|node| (node.id().clone(), node.index()))
            .collect();
        let roots: Vec<NodeIndex> = nodes
            .iter()
            .filter(|node| node.is_root())
            .map(Node::index)
            .collect();

        let nodes: Arc<[Node]> = nodes.into();

        let mut visited = HashSet::new();
        let mut sinks = BTreeMap::new();
        for &root in &roots {
            nodes[root].walk_visited(&nodes, &mut visited, &mut sinks, &mut |_: &Node| {});
        }

        debug!(
            flow = %name,
            nodes = nodes.len(),
            roots = roots.len(),
            sinks = sinks.len(),
            "flow constructed"
        );

        Ok(Self {
            name,
            nodes,
            lookup,
            roots,
            sinks: sinks.into_values().collect(),
            middleware: None,
            node_middleware: None,
        })
    }

    /// Sets hooks run around every invocation and rollback
    pub fn with_middleware(mut self, middleware: impl FlowMiddleware + 'static) -> Self {
        self.middleware = Some(Arc::new(middleware));
        self
    }

    /// Sets hooks run around every node that has none of its own
    pub fn with_node_middleware(mut self, middleware: impl NodeMiddleware + 'static) -> Self {
        self.node_middleware = Some(Arc::new(middleware));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.lookup.get(id).copied()
    }

    /// Nodes without dependencies, in declaration order
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Nodes without dependents, ordered by id
    pub fn sinks(&self) -> &[NodeIndex] {
        &self.sinks
    }

    /// Visits every node once, starting from the roots
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&Node),
    {
        let mut visited = HashSet::new();
        let mut sinks = BTreeMap::new();
        for &root in &self.roots {
            self.nodes[root].walk_visited(&self.nodes, &mut visited, &mut sinks, &mut visit);
        }
    }

    /// Runs the flow against `store`
    pub async fn invoke(&self, store: Arc<dyn Store>) -> Result<(), FlowError> {
        self.invoke_with(CancellationToken::new(), store).await
    }

    /// Runs the flow against `store`.
    ///
    /// `cancel` is handed to every call; the executor itself never cancels. On
    /// failure every completed node is reverted and the first fatal error is
    /// returned.
    pub async fn invoke_with(
        &self,
        cancel: CancellationToken,
        store: Arc<dyn Store>,
    ) -> Result<(), FlowError> {
        let id = Uuid::new_v4();
        let span = info_span!("invocation", flow = %self.name, invocation = %id);

        self.run(id, cancel, store).instrument(span).await
    }

    async fn run(
        &self,
        id: Uuid,
        cancel: CancellationToken,
        store: Arc<dyn Store>,
    ) -> Result<(), FlowError> {
        info!("invoking flow");

        if let Some(middleware) = &self.middleware {
            middleware
                .before_do(self, store.as_ref())
                .await
                .map_err(|source| self.hook_error(HookPhase::BeforeDo, source))?;
        }

        let tracker = Arc::new(Tracker::new(self.nodes.len()));
        let processes = Arc::new(Processes::new());
        let invocation = self.invocation(id, &tracker, &processes, &store, &cancel);

        processes.add(self.roots.len());
        for &root in &self.roots {
            invocation.schedule(root, Pass::Forward, Signal::Live);
        }
        processes.wait().await;

        if let Some(err) = processes.take_err() {
            error!(error = %err, "flow failed, rolling back");

            if let Err(rollback) = self.rollback_pass(id, cancel, tracker, store).await {
                error!(error = %rollback, "rollback failed");
            }
            return Err(err);
        }

        if let Some(middleware) = &self.middleware {
            middleware
                .after_do(self, store.as_ref())
                .await
                .map_err(|source| self.hook_error(HookPhase::AfterDo, source))?;
        }

        info!("flow completed");
        Ok(())
    }

    /// Reverts every node `tracker` recorded as completed, walking backward
    /// from the sinks. A tracker is rolled back at most once.
    pub async fn rollback(
        &self,
        tracker: Arc<Tracker>,
        store: Arc<dyn Store>,
    ) -> Result<(), FlowError> {
        let id = Uuid::new_v4();
        let span = info_span!("rollback", flow = %self.name, invocation = %id);

        self.rollback_pass(id, CancellationToken::new(), tracker, store)
            .instrument(span)
            .await
    }

    async fn rollback_pass(
        &self,
        id: Uuid,
        cancel: CancellationToken,
        tracker: Arc<Tracker>,
        store: Arc<dyn Store>,
    ) -> Result<(), FlowError> {
        if let Some(middleware) = &self.middleware {
            middleware
                .before_rollback(self, store.as_ref())
                .await
                .map_err(|source| self.hook_error(HookPhase::BeforeRollback, source))?;
        }

        let processes = Arc::new(Processes::new());
        let invocation = self.invocation(id, &tracker, &processes, &store, &cancel);

        processes.add(self.sinks.len());
        for &sink in &self.sinks {
            invocation.schedule(sink, Pass::Rollback, Signal::Live);
        }
        processes.wait().await;

        if let Some(err) = processes.take_err() {
            return Err(err);
        }

        if let Some(middleware) = &self.middleware {
            middleware
                .after_rollback(self, store.as_ref())
                .await
                .map_err(|source| self.hook_error(HookPhase::AfterRollback, source))?;
        }

        debug!("rollback completed");
        Ok(())
    }

    fn invocation(
        &self,
        id: Uuid,
        tracker: &Arc<Tracker>,
        processes: &Arc<Processes>,
        store: &Arc<dyn Store>,
        cancel: &CancellationToken,
    ) -> Invocation {
        Invocation {
            id,
            nodes: Arc::clone(&self.nodes),
            tracker: Arc::clone(tracker),
            processes: Arc::clone(processes),
            store: Arc::clone(store),
            cancel: cancel.clone(),
            middleware: self.node_middleware.clone(),
            span: Span::current(),
        }
    }

    fn hook_error(&self, phase: HookPhase, source: BoxError) -> FlowError {
        error!(%phase, error = %source, "flow hook failed");

        FlowError::Hook {
            flow: self.name.clone(),
            phase,
            source,
        }
    }

    /// Renders the flow in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        let mut graph = DiGraph::<String, ()>::new();
        let indices: Vec<_> = self
            .nodes
            .iter()
            .map(|node| graph.add_node(node.id().to_string()))
            .collect();

        for node in self.nodes.iter() {
            for &next in node.next() {
                graph.add_edge(indices[node.index()], indices[next], ());
            }
        }

        format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("roots", &self.roots)
            .field("sinks", &self.sinks)
            .finish_non_exhaustive()
    }
}
