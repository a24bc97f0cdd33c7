use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::PipelineError,
    lang_graph::{
        graph::{NodeId, Task},
        prompts::{self, ESCALATION_MESSAGE},
        types::state::AgentState,
    },
    llm::LlmClient,
};

/// Produces the customer-facing reply.
pub struct FormatTask {
    llm: Arc<LlmClient>,
}

impl FormatTask {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Task for FormatTask {
    fn id(&self) -> NodeId {
        NodeId::Format
    }

    async fn run(&self, state: &mut AgentState) -> Result<(), PipelineError> {
        info!("FormatTask started");
        // No grounded answer means nothing may be said beyond the hand-off.
        let answer = match state.validated_answer() {
            Some(answer) if !state.escalate_to_human() => answer.to_string(),
            _ => {
                state.escalate();
                state.finish(ESCALATION_MESSAGE.to_string());
                info!("Escalation message returned");
                return Ok(());
            }
        };

        let prompt = prompts::format_answer(&answer);
        let formatted = self.llm.simple_query(&prompt, None).await?;
        state.finish(formatted);
        info!("Answer formatted");
        Ok(())
    }
}
