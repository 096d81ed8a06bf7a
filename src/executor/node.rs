//! Nodes and their traversal
//!
//! A node wraps a call, an optional revert and an optional condition. Nodes are
//! owned by a [`super::Flow`] arena and refer to each other by index.
//!
//! # Design Decision Hidden
//!
//! **"How a diamond executes each node exactly once"**
//!
//! Every node step runs in its own task. A node is signalled once per
//! predecessor (forward) or successor (rollback) and the tracker barrier lets
//! only the last arrival run the body. Skipped nodes still deliver a signal, so
//! the barrier always fills.

use super::call::Call;
use super::condition::Condition;
use super::error::{ErrorHandle, FlowError, HookPhase, NodeFailure};
use super::middleware::NodeMiddleware;
use super::processes::{Processes, Retire};
use super::tracker::{Pass, Signal, Tracker};
use crate::graph::{DependsOn, Dependent, NodeId, NodeIndex};
use crate::store::Store;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, Instrument, Span};
use uuid::Uuid;

/// Scheduling unit of a flow
pub struct Node {
    id: NodeId,
    index: NodeIndex,
    depends_on: DependsOn,
    pub(crate) previous: Vec<NodeIndex>,
    pub(crate) next: Vec<NodeIndex>,
    condition: Option<Condition>,
    call: Option<Arc<dyn Call>>,
    revert: Option<Arc<dyn Call>>,
    on_error: Option<Arc<ErrorHandle>>,
    middleware: Option<Arc<dyn NodeMiddleware>>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            index: 0,
            depends_on: DependsOn::new(),
            previous: Vec::new(),
            next: Vec::new(),
            condition: None,
            call: None,
            revert: None,
            on_error: None,
            middleware: None,
        }
    }

    /// Declares dependencies by id
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

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_call(mut self, call: impl Call + 'static) -> Self {
        self.call = Some(Arc::new(call));
        self
    }

    /// Sets the call run when the flow rolls back
    pub fn with_revert(mut self, revert: impl Call + 'static) -> Self {
        self.revert = Some(Arc::new(revert));
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorHandle) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Sets hooks for this node, overriding the flow's node middleware
    pub fn with_middleware(mut self, middleware: impl NodeMiddleware + 'static) -> Self {
        self.middleware = Some(Arc::new(middleware));
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Position of the node in its flow
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn dependencies(&self) -> &DependsOn {
        &self.depends_on
    }

    pub fn previous(&self) -> &[NodeIndex] {
        &self.previous
    }

    pub fn next(&self) -> &[NodeIndex] {
        &self.next
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn call(&self) -> Option<&Arc<dyn Call>> {
        self.call.as_ref()
    }

    pub fn revert(&self) -> Option<&Arc<dyn Call>> {
        self.revert.as_ref()
    }

    pub fn on_error(&self) -> Option<&ErrorHandle> {
        self.on_error.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.previous.is_empty()
    }

    pub fn is_sink(&self) -> bool {
        self.next.is_empty()
    }

    pub(crate) fn set_index(&mut self, index: NodeIndex) {
        self.index = index;
    }

    /// Arrivals needed to fill the barrier. Roots and sinks are signalled once
    /// by the flow.
    pub(crate) fn expected(&self, pass: Pass) -> usize {
        match pass {
            Pass::Forward => self.previous.len().max(1),
            Pass::Rollback => self.next.len().max(1),
        }
    }

    /// Visits every node reachable from this one exactly once and collects the
    /// sinks into `sinks`.
    pub fn walk<F>(&self, nodes: &[Node], sinks: &mut BTreeMap<NodeId, NodeIndex>, visit: &mut F)
    where
        F: FnMut(&Node),
    {
        let mut visited = HashSet::new();
        self.walk_visited(nodes, &mut visited, sinks, visit);
    }

    pub(crate) fn walk_visited<F>(
        &self,
        nodes: &[Node],
        visited: &mut HashSet<NodeIndex>,
        sinks: &mut BTreeMap<NodeId, NodeIndex>,
        visit: &mut F,
    ) where
        F: FnMut(&Node),
    {
        if !visited.insert(self.index) {
            return;
        }

        visit(self);

        if self.is_sink() {
            sinks.insert(self.id.clone(), self.index);
            return;
        }

        for &next in &self.next {
            nodes[next].walk_visited(nodes, visited, sinks, visit);
        }
    }

    fn middleware<'a>(&'a self, invocation: &'a Invocation) -> Option<&'a Arc<dyn NodeMiddleware>> {
        self.middleware.as_ref().or(invocation.middleware.as_ref())
    }

    fn fail(&self, invocation: &Invocation, source: NodeFailure) {
        error!(node = %self.id, error = %source, "node failed");

        invocation.processes.fatal(FlowError::Node {
            node: self.id.clone(),
            source,
            on_error: self.on_error.clone(),
        });
    }

    /// Forward step: barrier, condition, call, fan out. The task running it
    /// retires its pending unit.
    pub(crate) async fn execute(&self, invocation: &Invocation, signal: Signal) {
        let inherits_skip = {
            let mut ledger = invocation.tracker.lock(self.index, Pass::Forward);
            if !ledger.reached(signal, self.expected(Pass::Forward)) {
                trace!(node = %self.id, hits = ledger.hits, "waiting for remaining dependencies");
                return;
            }
            ledger.inherits_skip(self.condition.is_some())
        };

        if inherits_skip {
            debug!(node = %self.id, "upstream skipped, skipping node");
            self.skip(invocation);
            return;
        }

        let store = invocation.store.as_ref();

        if let Some(condition) = &self.condition {
            match condition.eval(store) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(node = %self.id, "condition not met, skipping node");
                    self.skip(invocation);
                    return;
                }
                Err(err) => {
                    self.fail(invocation, NodeFailure::Condition(err));
                    return;
                }
            }
        }

        let middleware = self.middleware(invocation);

        if let Some(middleware) = middleware {
            if let Err(source) = middleware.before_do(self, store).await {
                let phase = HookPhase::BeforeDo;
                self.fail(invocation, NodeFailure::Hook { phase, source });
                return;
            }
        }

        if let Some(call) = &self.call {
            debug!(node = %self.id, "executing call");
            if let Err(err) = call.call(&invocation.cancel, store).await {
                self.fail(invocation, NodeFailure::Call(err));
                return;
            }
        }

        invocation.tracker.mark(self.index, Pass::Forward);

        if invocation.processes.is_failed() {
            debug!(node = %self.id, "invocation failed, not scheduling successors");
            return;
        }

        invocation.processes.add(self.next.len());
        for &next in &self.next {
            invocation.schedule(next, Pass::Forward, Signal::Live);
        }

        if let Some(middleware) = middleware {
            if let Err(source) = middleware.after_do(self, store).await {
                let phase = HookPhase::AfterDo;
                self.fail(invocation, NodeFailure::Hook { phase, source });
            }
        }
    }

    /// Marks the node skipped and passes a skip signal to every successor
    pub(crate) fn skip(&self, invocation: &Invocation) {
        invocation.tracker.skip(self.index);

        if invocation.processes.is_failed() {
            return;
        }

        invocation.processes.add(self.next.len());
        for &next in &self.next {
            invocation.schedule(next, Pass::Forward, Signal::Skipped);
        }
    }

    /// Backward step: barrier, revert, fan out to predecessors. The task
    /// running it retires its pending unit.
    pub(crate) async fn rollback(&self, invocation: &Invocation) {
        let expected = self.expected(Pass::Rollback);
        if !invocation
            .tracker
            .reached(self.index, Pass::Rollback, Signal::Live, expected)
        {
            trace!(node = %self.id, "waiting for remaining successors to roll back");
            return;
        }

        let store = invocation.store.as_ref();
        let middleware = self.middleware(invocation);

        if let Some(middleware) = middleware {
            if let Err(source) = middleware.before_rollback(self, store).await {
                let phase = HookPhase::BeforeRollback;
                self.fail(invocation, NodeFailure::Hook { phase, source });
                return;
            }
        }

        let _previous = SchedulePrevious {
            node: self,
            invocation,
        };

        match &self.revert {
            Some(revert) if invocation.tracker.completed(self.index, Pass::Forward) => {
                debug!(node = %self.id, "executing revert");
                if let Err(err) = revert.call(&invocation.cancel, store).await {
                    error!(node = %self.id, error = %err, "revert failed");
                }
            }
            Some(_) => debug!(node = %self.id, "node did not complete, nothing to revert"),
            None => {}
        }

        invocation.tracker.mark(self.index, Pass::Rollback);

        if let Some(middleware) = middleware {
            if let Err(source) = middleware.after_rollback(self, store).await {
                let phase = HookPhase::AfterRollback;
                self.fail(invocation, NodeFailure::Hook { phase, source });
            }
        }
    }
}

impl Dependent for Node {
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

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("previous", &self.previous)
            .field("next", &self.next)
            .field("condition", &self.condition)
            .field("call", &self.call.is_some())
            .field("revert", &self.revert.is_some())
            .field("on_error", &self.on_error)
            .finish_non_exhaustive()
    }
}

/// Schedules the rollback of a node's predecessors when dropped
struct SchedulePrevious<'a> {
    node: &'a Node,
    invocation: &'a Invocation,
}

impl Drop for SchedulePrevious<'_> {
    fn drop(&mut self) {
        let previous = &self.node.previous;

        self.invocation.processes.add(previous.len());
        for &index in previous {
            self.invocation.schedule(index, Pass::Rollback, Signal::Live);
        }
    }
}

/// State shared by every task of one pass of one invocation
#[derive(Clone)]
pub(crate) struct Invocation {
    pub(crate) id: Uuid,
    pub(crate) nodes: Arc<[Node]>,
    pub(crate) tracker: Arc<Tracker>,
    pub(crate) processes: Arc<Processes>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) cancel: CancellationToken,
    pub(crate) middleware: Option<Arc<dyn NodeMiddleware>>,
    pub(crate) span: Span,
}

impl Invocation {
    /// Announces an arrival at `node` and spawns the task delivering it. The
    /// caller has already counted the task in `processes`.
    ///
    /// A panic inside the step is recorded as the node's failure before the
    /// pending unit is retired, so the waiter always observes it.
    pub(crate) fn schedule(&self, node: NodeIndex, pass: Pass, signal: Signal) {
        self.tracker.schedule(node, pass);

        let invocation = self.clone();
        let span = self.span.clone();

        tokio::spawn(
            async move {
                let _retire = Retire(&invocation.processes);
                let node = &invocation.nodes[node];

                let step = match pass {
                    Pass::Forward => node.execute(&invocation, signal).boxed(),
                    Pass::Rollback => node.rollback(&invocation).boxed(),
                };

                if let Err(panic) = AssertUnwindSafe(step).catch_unwind().await {
                    let message = panic_message(&*panic);
                    node.fail(&invocation, NodeFailure::Panicked { pass, message });
                }
            }
            .instrument(span),
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("pending", &self.processes.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(edges: &[(usize, usize)], ids: &[&str]) -> Vec<Node> {
        let mut nodes: Vec<Node> = ids.iter().map(|id| Node::new(*id)).collect();
        for (index, node) in nodes.iter_mut().enumerate() {
            node.set_index(index);
        }
        for &(from, to) in edges {
            nodes[from].next.push(to);
            nodes[to].previous.push(from);
        }
        nodes
    }

    #[test]
    fn test_expected_arrivals() {
        let nodes = linked(&[(0, 1), (0, 2), (1, 3), (2, 3)], &["a", "b", "c", "d"]);

        assert_eq!(nodes[0].expected(Pass::Forward), 1);
        assert_eq!(nodes[3].expected(Pass::Forward), 2);
        assert_eq!(nodes[0].expected(Pass::Rollback), 2);
        assert_eq!(nodes[3].expected(Pass::Rollback), 1);
    }

    #[test]
    fn test_walk_visits_each_node_once() {
        let nodes = linked(&[(0, 1), (0, 2), (1, 3), (2, 3), (2, 4)], &["a", "b", "c", "d", "e"]);

        let mut visited = Vec::new();
        let mut sinks = BTreeMap::new();
        nodes[0].walk(&nodes, &mut sinks, &mut |node: &Node| visited.push(node.id().to_string()));

        visited.sort();
        assert_eq!(visited, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(sinks.keys().map(NodeId::as_str).collect::<Vec<_>>(), vec!["d", "e"]);
        assert_eq!(sinks[&NodeId::new("d")], 3);
    }

    #[test]
    fn test_builder() {
        let node = Node::new("charge")
            .depends_on(["user", "cart"])
            .with_on_error(ErrorHandle::new());

        assert_eq!(node.id().as_str(), "charge");
        assert_eq!(node.dependencies().len(), 2);
        assert!(node.dependencies().values().all(Option::is_none));
        assert!(node.on_error().is_some());
        assert!(node.call().is_none());
    }
}
