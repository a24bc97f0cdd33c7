use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::PipelineError,
    lang_graph::{
        graph::{NodeId, Task},
        prompts,
        types::{query::Intent, state::AgentState},
    },
    llm::LlmClient,
};

pub struct ClassifyTask {
    llm: Arc<LlmClient>,
}

impl ClassifyTask {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Task for ClassifyTask {
    fn id(&self) -> NodeId {
        NodeId::Classify
    }

    async fn run(&self, state: &mut AgentState) -> Result<(), PipelineError> {
        info!("ClassifyTask started");
        let prompt = prompts::classify_query(state.user_query());
        let response = self.llm.simple_query(&prompt, None).await?;

        let intent = Intent::parse(&response);
        info!(intent = %intent, "Query classified");
        state.intent = Some(intent);
        Ok(())
    }
}
