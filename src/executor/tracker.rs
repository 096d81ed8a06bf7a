//! Execution tracker
//!
//! One tracker exists per invocation. It keeps a ledger per node and per pass
//! and implements the fan-in barrier: a node with `n` predecessors is signalled
//! `n` times, and only the arrival that fills the barrier runs the node body.
//!
//! # Design Decision Hidden
//!
//! Each ledger sits behind its own mutex, so a signal never holds more than one
//! node's guard and siblings never contend on a flow wide lock.

use super::lock;
use crate::graph::NodeIndex;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Direction of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Forward,
    Rollback,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Forward => f.write_str("forward"),
            Pass::Rollback => f.write_str("rollback"),
        }
    }
}

/// Kind of arrival delivered to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The sender completed, or the flow started the node
    Live,
    /// The sender was skipped
    Skipped,
}

/// Per node, per pass record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    /// Arrivals counted so far
    pub hits: usize,
    pub live: usize,
    pub skipped_inputs: usize,
    /// Arrivals announced by a sender but not necessarily delivered yet
    pub scheduled: usize,
    pub completed: bool,
    pub skipped: bool,
}

impl Ledger {
    /// Records one arrival; returns true if it fills the barrier
    pub fn reached(&mut self, signal: Signal, expected: usize) -> bool {
        self.hits += 1;
        match signal {
            Signal::Live => self.live += 1,
            Signal::Skipped => self.skipped_inputs += 1,
        }

        self.hits == expected
    }

    /// Returns true if the node should inherit a skip instead of executing.
    ///
    /// Unconditioned nodes are skipped as soon as any input was skipped.
    /// Conditioned nodes are skipped only when no input was live.
    pub fn inherits_skip(&self, conditioned: bool) -> bool {
        self.skipped_inputs > 0 && (!conditioned || self.live == 0)
    }
}

/// Per invocation execution ledger
#[derive(Debug)]
pub struct Tracker {
    forward: Vec<Mutex<Ledger>>,
    rollback: Vec<Mutex<Ledger>>,
}

impl Tracker {
    /// Creates a tracker for a flow of `nodes` nodes
    pub fn new(nodes: usize) -> Self {
        Self {
            forward: (0..nodes).map(|_| Mutex::default()).collect(),
            rollback: (0..nodes).map(|_| Mutex::default()).collect(),
        }
    }

    /// Number of nodes tracked
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Locks the ledger of `node`. Never hold the guard across an `.await`.
    pub fn lock(&self, node: NodeIndex, pass: Pass) -> MutexGuard<'_, Ledger> {
        let ledgers = match pass {
            Pass::Forward => &self.forward,
            Pass::Rollback => &self.rollback,
        };

        lock(&ledgers[node])
    }

    /// Records one arrival; returns true if it fills the barrier
    pub fn reached(&self, node: NodeIndex, pass: Pass, signal: Signal, expected: usize) -> bool {
        self.lock(node, pass).reached(signal, expected)
    }

    /// Announces an arrival before the receiving task starts
    pub fn schedule(&self, node: NodeIndex, pass: Pass) {
        self.lock(node, pass).scheduled += 1;
    }

    /// Marks `node` completed without touching its counter
    pub fn mark(&self, node: NodeIndex, pass: Pass) {
        self.lock(node, pass).completed = true;
    }

    /// Marks `node` skipped in the forward pass
    pub fn skip(&self, node: NodeIndex) {
        self.lock(node, Pass::Forward).skipped = true;
    }

    pub fn completed(&self, node: NodeIndex, pass: Pass) -> bool {
        self.lock(node, pass).completed
    }

    pub fn skipped(&self, node: NodeIndex) -> bool {
        self.lock(node, Pass::Forward).skipped
    }

    pub fn hits(&self, node: NodeIndex, pass: Pass) -> usize {
        self.lock(node, pass).hits
    }

    /// Returns true if arrivals were announced for `node` but not all delivered
    pub fn in_flight(&self, node: NodeIndex, pass: Pass) -> bool {
        let ledger = self.lock(node, pass);
        ledger.scheduled > ledger.hits
    }

    /// Snapshot of the ledger of `node`
    pub fn ledger(&self, node: NodeIndex, pass: Pass) -> Ledger {
        self.lock(node, pass).clone()
    }
}
