use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::PipelineError,
    knowledge::Retriever,
    lang_graph::{
        tasks::{classify, format, retrieve, validate},
        types::state::AgentState,
    },
    llm::LlmClient,
};

/// Upper bound on task executions per run, guarding against wiring cycles.
const MAX_STEPS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Classify,
    Retrieve,
    Validate,
    Format,
    End,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeId::Classify => "classify_query",
            NodeId::Retrieve => "retrieve_knowledge",
            NodeId::Validate => "validate_retrieval",
            NodeId::Format => "format_answer",
            NodeId::End => "end",
        };
        write!(f, "{s}")
    }
}

/// One pipeline step. Tasks keep no per-run state; everything a run
/// produces lives in the [`AgentState`] passed in.
#[async_trait]
pub trait Task: Send + Sync {
    fn id(&self) -> NodeId;

    async fn run(&self, state: &mut AgentState) -> Result<(), PipelineError>;
}

pub type Router = fn(&AgentState) -> NodeId;

enum Edge {
    Direct(NodeId),
    Conditional { router: Router, targets: Vec<NodeId> },
}

pub struct Graph {
    name: String,
    entry: NodeId,
    tasks: HashMap<NodeId, Arc<dyn Task>>,
    edges: HashMap<NodeId, Edge>,
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the node that follows `from` for the given state.
    pub fn next(&self, from: NodeId, state: &AgentState) -> Result<NodeId, PipelineError> {
        match self.edges.get(&from) {
            Some(Edge::Direct(to)) => Ok(*to),
            Some(Edge::Conditional { router, targets }) => {
                let to = router(state);
                if targets.contains(&to) {
                    Ok(to)
                } else {
                    Err(PipelineError::Graph(format!(
                        "router of {from} chose undeclared target {to}"
                    )))
                }
            }
            None => Err(PipelineError::Graph(format!("{from} has no outgoing edge"))),
        }
    }

    /// Drives `state` from the entry node to [`NodeId::End`] and returns the
    /// nodes that ran, in order.
    pub async fn execute(&self, state: &mut AgentState) -> Result<Vec<NodeId>, PipelineError> {
        let mut path = Vec::new();
        let mut current = self.entry;
        while current != NodeId::End {
            if path.len() == MAX_STEPS {
                return Err(PipelineError::Graph(format!(
                    "{} did not finish within {MAX_STEPS} steps",
                    self.name
                )));
            }
            let task = self
                .tasks
                .get(&current)
                .ok_or_else(|| PipelineError::Graph(format!("no task registered for {current}")))?;
            debug!("Running {}", current);
            task.run(state).await?;
            path.push(current);
            current = self.next(current, state)?;
        }
        Ok(path)
    }
}

pub struct GraphBuilder {
    name: String,
    entry: Option<NodeId>,
    tasks: HashMap<NodeId, Arc<dyn Task>>,
    edges: HashMap<NodeId, Edge>,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entry: None,
            tasks: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Registers a task; the first one added becomes the entry point.
    #[must_use]
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let id = task.id();
        self.entry.get_or_insert(id);
        self.tasks.insert(id, task);
        self
    }

    #[must_use]
    pub fn add_edge(mut self, from: NodeId, to: NodeId) -> Self {
        self.edges.insert(from, Edge::Direct(to));
        self
    }

    /// `router` must return one of `targets`.
    #[must_use]
    pub fn add_conditional_edge(mut self, from: NodeId, router: Router, targets: &[NodeId]) -> Self {
        self.edges.insert(
            from,
            Edge::Conditional {
                router,
                targets: targets.to_vec(),
            },
        );
        self
    }

    pub fn build(self) -> Result<Graph, PipelineError> {
        let entry = self
            .entry
            .ok_or_else(|| PipelineError::Graph(format!("{} has no tasks", self.name)))?;

        for id in self.tasks.keys() {
            if !self.edges.contains_key(id) {
                return Err(PipelineError::Graph(format!("{id} has no outgoing edge")));
            }
        }
        for (from, edge) in &self.edges {
            let targets = match edge {
                Edge::Direct(to) => std::slice::from_ref(to),
                Edge::Conditional { targets, .. } => targets.as_slice(),
            };
            if let Some(missing) = targets
                .iter()
                .find(|to| **to != NodeId::End && !self.tasks.contains_key(*to))
            {
                return Err(PipelineError::Graph(format!(
                    "edge from {from} targets unregistered {missing}"
                )));
            }
        }

        Ok(Graph {
            name: self.name,
            entry,
            tasks: self.tasks,
            edges: self.edges,
        })
    }
}

/// Retrieval is only worthwhile for the four policy intents.
pub fn route_after_classification(state: &AgentState) -> NodeId {
    match &state.intent {
        Some(intent) if intent.requires_retrieval() => NodeId::Retrieve,
        _ => NodeId::Format,
    }
}

/// Always formatting for now; the escalation outcome is handled inside the
/// format task.
pub fn route_after_validation(_state: &AgentState) -> NodeId {
    NodeId::Format
}

pub fn build_loan_graph(
    llm: Arc<LlmClient>,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
) -> Result<Graph, PipelineError> {
    let classify = Arc::new(classify::ClassifyTask::new(llm.clone()));
    let retrieve = Arc::new(retrieve::RetrieveTask::new(retriever, top_k));
    let validate = Arc::new(validate::ValidateTask::new(llm.clone()));
    let format = Arc::new(format::FormatTask::new(llm));

    GraphBuilder::new("loan_assistant_workflow")
        .add_task(classify)
        .add_task(retrieve)
        .add_task(validate)
        .add_task(format)
        .add_conditional_edge(
            NodeId::Classify,
            route_after_classification,
            &[NodeId::Retrieve, NodeId::Format],
        )
        .add_edge(NodeId::Retrieve, NodeId::Validate)
        .add_conditional_edge(NodeId::Validate, route_after_validation, &[NodeId::Format])
        .add_edge(NodeId::Format, NodeId::End)
        .build()
}
