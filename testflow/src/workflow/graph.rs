//! The fixed stage graph.

use crate::core::StageId;
use crate::errors::WorkflowError;
use std::collections::BTreeMap;
use std::fmt;

/// A node of the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Before the first stage.
    Start,
    /// A stage.
    Stage(StageId),
    /// After the last stage.
    End,
    /// A stage failed; nothing runs after this.
    Aborted,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("START"),
            Self::Stage(stage) => write!(f, "{stage}"),
            Self::End => f.write_str("END"),
            Self::Aborted => f.write_str("ABORTED"),
        }
    }
}

/// The linear graph `START -> dependency -> context -> generation -> END`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowGraph {
    order: Vec<StageId>,
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::linear()
    }
}

impl WorkflowGraph {
    /// Creates the standard linear graph.
    #[must_use]
    pub fn linear() -> Self {
        Self {
            order: StageId::ALL.to_vec(),
        }
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageId] {
        &self.order
    }

    /// Returns the node that follows `node` on success.
    ///
    /// `End` and `Aborted` are terminal and map to themselves.
    #[must_use]
    pub fn successor(&self, node: Node) -> Node {
        match node {
            Node::Start => self.order.first().map_or(Node::End, |s| Node::Stage(*s)),
            Node::Stage(stage) => self
                .order
                .iter()
                .position(|s| *s == stage)
                .and_then(|i| self.order.get(i + 1))
                .map_or(Node::End, |s| Node::Stage(*s)),
            Node::End => Node::End,
            Node::Aborted => Node::Aborted,
        }
    }

    /// Returns the node reached after running `node`.
    ///
    /// A failed stage moves to `Aborted`; a successful one moves to its
    /// successor. Terminal nodes map to themselves.
    #[must_use]
    pub fn transition(&self, node: Node, succeeded: bool) -> Node {
        match node {
            Node::Stage(_) if !succeeded => Node::Aborted,
            _ => self.successor(node),
        }
    }

    /// Returns the full success path, `Start` through `End`.
    #[must_use]
    pub fn path(&self) -> Vec<Node> {
        let mut path = vec![Node::Start];
        let mut node = Node::Start;
        while node != Node::End {
            node = self.successor(node);
            path.push(node);
        }
        path
    }

    /// Checks that every stage of the graph is bound exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Initialization`] naming the first stage that is
    /// missing or bound more than once.
    pub fn validate(&self, bound: &[StageId]) -> Result<(), WorkflowError> {
        let mut counts: BTreeMap<StageId, usize> = BTreeMap::new();
        for stage in bound {
            *counts.entry(*stage).or_default() += 1;
        }
        for stage in &self.order {
            match counts.get(stage).copied().unwrap_or(0) {
                1 => {}
                0 => {
                    return Err(WorkflowError::Initialization(format!(
                        "no stage bound for '{stage}'"
                    )))
                }
                n => {
                    return Err(WorkflowError::Initialization(format!(
                        "stage '{stage}' is bound {n} times"
                    )))
                }
            }
        }
        Ok(())
    }
}
