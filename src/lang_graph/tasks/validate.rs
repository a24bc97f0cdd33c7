use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    error::PipelineError,
    lang_graph::{
        graph::{NodeId, Task},
        prompts::{self, INSUFFICIENT_CONTEXT},
        types::state::AgentState,
    },
    llm::LlmClient,
};

/// Checks that the retrieved chunks actually answer the question.
pub struct ValidateTask {
    llm: Arc<LlmClient>,
}

impl ValidateTask {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Task for ValidateTask {
    fn id(&self) -> NodeId {
        NodeId::Validate
    }

    async fn run(&self, state: &mut AgentState) -> Result<(), PipelineError> {
        info!("ValidateTask started");
        if state.retrieved_docs.is_empty() {
            warn!("No documents retrieved, escalating to a human");
            state.escalate();
            return Ok(());
        }

        let context = state
            .retrieved_docs
            .iter()
            .map(|doc| doc.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = prompts::validate_retrieval_system();
        let prompt = prompts::validate_retrieval_user(&context, state.user_query());
        let answer = self.llm.simple_query(&prompt, Some(&system)).await?;

        // The model may wrap the sentinel in other text.
        if answer.contains(INSUFFICIENT_CONTEXT) {
            info!(escalate_to_human = true, "Context insufficient");
            state.escalate();
        } else {
            info!(escalate_to_human = false, "Answer grounded in context");
            state.accept(answer);
        }
        Ok(())
    }
}
