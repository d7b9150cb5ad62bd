//! Orchestration tree nodes
//!
//! An orchestration is a finite tree of nodes: `Agent` leaves composed
//! under `Sequential`, `Parallel`, and `Loop` nodes. Trees are built by
//! value, so the structural graph is acyclic by construction; the only
//! repetition comes from a Loop's bounded iteration count.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinSet;

use crate::agent::worker::Agent;
use crate::core::{EnsembleError, Result};
use crate::state::StateStore;

/// Control value threaded through node execution.
///
/// `Exit` is the early-exit signal in flight: raised by a tool, propagated
/// by Sequential and Parallel, absorbed by the nearest enclosing Loop (or
/// by the orchestrator at the root).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Proceed normally
    Continue,
    /// Early-exit signal propagating toward the nearest Loop
    Exit,
}

/// A node in an orchestration tree
pub enum Node {
    /// Leaf: one worker agent
    Agent(Agent),
    /// Children run one at a time, in order
    Sequential(Sequential),
    /// Children run concurrently, join-all before completing
    Parallel(Parallel),
    /// Body run repeatedly up to an iteration cap
    Loop(Loop),
}

/// Ordered list of children, each run to completion before the next starts
pub struct Sequential {
    name: String,
    children: Vec<Arc<Node>>,
}

/// Children started concurrently; the node completes only when all
/// children complete
pub struct Parallel {
    name: String,
    children: Vec<Arc<Node>>,
}

/// Ordered body run repeatedly, bounded by a maximum iteration count
pub struct Loop {
    name: String,
    body: Vec<Arc<Node>>,
    max_iterations: usize,
}

impl Sequential {
    pub fn new(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            children: children.into_iter().map(Arc::new).collect(),
        }
    }
}

impl Parallel {
    pub fn new(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            children: children.into_iter().map(Arc::new).collect(),
        }
    }
}

impl Loop {
    pub fn new(name: impl Into<String>, body: Vec<Node>, max_iterations: usize) -> Self {
        Self {
            name: name.into(),
            body: body.into_iter().map(Arc::new).collect(),
            max_iterations,
        }
    }

    /// The iteration cap
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

impl From<Agent> for Node {
    fn from(agent: Agent) -> Self {
        Node::Agent(agent)
    }
}

impl From<Sequential> for Node {
    fn from(node: Sequential) -> Self {
        Node::Sequential(node)
    }
}

impl From<Parallel> for Node {
    fn from(node: Parallel) -> Self {
        Node::Parallel(node)
    }
}

impl From<Loop> for Node {
    fn from(node: Loop) -> Self {
        Node::Loop(node)
    }
}

impl Node {
    /// Name of this node, used for paths in progress output and errors
    pub fn name(&self) -> &str {
        match self {
            Node::Agent(agent) => agent.name(),
            Node::Sequential(seq) => &seq.name,
            Node::Parallel(par) => &par.name,
            Node::Loop(lp) => &lp.name,
        }
    }

    /// Execute this node against the shared state.
    ///
    /// Boxed for recursion; takes an owned `Arc` and store handle so that
    /// Parallel can spawn children as independent tasks.
    pub(crate) fn execute(
        self: Arc<Self>,
        state: StateStore,
        path: String,
    ) -> BoxFuture<'static, Result<Flow>> {
        Box::pin(async move {
            match &*self {
                Node::Agent(agent) => {
                    let outcome = agent
                        .run(&state)
                        .await
                        .map_err(|e| EnsembleError::at_node(&path, e))?;
                    Ok(if outcome.exit {
                        Flow::Exit
                    } else {
                        Flow::Continue
                    })
                }

                Node::Sequential(seq) => {
                    for child in &seq.children {
                        let child_path = format!("{}/{}", path, child.name());
                        // Sequential never absorbs the exit signal; only
                        // Loop does.
                        if let Flow::Exit =
                            child.clone().execute(state.clone(), child_path).await?
                        {
                            return Ok(Flow::Exit);
                        }
                    }
                    Ok(Flow::Continue)
                }

                Node::Parallel(par) => run_parallel(par, state, &path).await,

                Node::Loop(lp) => {
                    'iterations: for _ in 1..=lp.max_iterations {
                        for child in &lp.body {
                            let child_path = format!("{}/{}", path, child.name());
                            if let Flow::Exit =
                                child.clone().execute(state.clone(), child_path).await?
                            {
                                // Exit absorbed: the loop is done, not failed
                                break 'iterations;
                            }
                        }
                    }
                    Ok(Flow::Continue)
                }
            }
        })
    }
}

/// Run a Parallel node's children as concurrent tasks on one shared store.
///
/// All children are awaited before anything propagates, so no sibling's
/// mutations are left half-applied without observability. Outcomes are
/// collected by declaration index: if several children fail or raise the
/// exit signal concurrently, the first in declaration order wins.
async fn run_parallel(par: &Parallel, state: StateStore, path: &str) -> Result<Flow> {
    let mut set: JoinSet<(usize, Result<Flow>)> = JoinSet::new();

    for (index, child) in par.children.iter().enumerate() {
        let child = child.clone();
        let state = state.clone();
        let child_path = format!("{}/{}", path, child.name());
        set.spawn(async move { (index, child.execute(state, child_path).await) });
    }

    let mut outcomes: Vec<Option<Result<Flow>>> = Vec::new();
    outcomes.resize_with(par.children.len(), || None);
    let mut panic: Option<EnsembleError> = None;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => {
                // Keep joining the rest before reporting
                panic.get_or_insert(EnsembleError::Other(format!(
                    "node '{}': child task panicked: {}",
                    path, e
                )));
            }
        }
    }

    let mut exit = false;
    for outcome in outcomes.into_iter().flatten() {
        match outcome? {
            Flow::Exit => exit = true,
            Flow::Continue => {}
        }
    }

    if let Some(err) = panic {
        return Err(err);
    }

    Ok(if exit { Flow::Exit } else { Flow::Continue })
}
