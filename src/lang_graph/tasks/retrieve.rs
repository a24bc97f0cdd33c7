use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::PipelineError,
    knowledge::Retriever,
    lang_graph::{
        graph::{NodeId, Task},
        types::state::AgentState,
    },
};

pub struct RetrieveTask {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl RetrieveTask {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl Task for RetrieveTask {
    fn id(&self) -> NodeId {
        NodeId::Retrieve
    }

    async fn run(&self, state: &mut AgentState) -> Result<(), PipelineError> {
        info!("RetrieveTask started");
        let docs = self
            .retriever
            .retrieve(state.user_query(), self.top_k)
            .await?;
        info!(count = docs.len(), "Knowledge retrieved");
        state.retrieved_docs = docs;
        Ok(())
    }
}
