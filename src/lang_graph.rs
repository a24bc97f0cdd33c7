pub mod graph;
pub mod prompts;
pub mod tasks;
pub mod types;

use std::sync::Arc;

use tracing::info;

use crate::{
    error::PipelineError,
    knowledge::Retriever,
    lang_graph::{
        graph::{Graph, NodeId},
        types::state::AgentState,
    },
    llm::LlmClient,
};

/// A finished pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: AgentState,
    pub path: Vec<NodeId>,
}

/// Answers loan questions by driving the task graph once per query.
///
/// The graph is built once and shared; each call gets its own
/// [`AgentState`], so concurrent queries never see each other's data.
#[derive(Clone)]
pub struct LoanAssistant {
    graph: Arc<Graph>,
}

impl LoanAssistant {
    pub fn new(
        llm: Arc<LlmClient>,
        retriever: Arc<dyn Retriever>,
        top_k: usize,
    ) -> Result<Self, PipelineError> {
        let graph = graph::build_loan_graph(llm, retriever, top_k)?;
        info!("Graph '{}' ready", graph.name());
        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    pub async fn run(&self, user_query: &str) -> Result<RunOutcome, PipelineError> {
        let mut state = AgentState::new(user_query);
        let path = self.graph.execute(&mut state).await?;
        Ok(RunOutcome { state, path })
    }

    pub async fn query(&self, user_query: &str) -> Result<String, PipelineError> {
        self.run(user_query)
            .await?
            .state
            .into_final_answer()
            .ok_or_else(|| PipelineError::Graph("run ended without a final answer".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use tempfile::tempdir;

    use super::*;
    use crate::{
        error::{CompletionError, IndexError},
        knowledge::{KnowledgeIndex, TextSplitter},
        lang_graph::{
            prompts::{ESCALATION_MESSAGE, INSUFFICIENT_CONTEXT},
            types::query::Intent,
        },
        llm::Role,
        testing::{HashingEmbedder, ScriptedLlm, Stage, StaticRetriever},
        vector_db::MemoryVectorStore,
    };

    const POLICY: [&str; 4] = [
        "Fixed personal loan rates currently range from 6.5% to 18% APR.",
        "Rates depend on credit score and loan term.",
        "Auto loans start at 5.9% APR for terms up to 60 months.",
        "Rate locks are valid for 30 days after approval.",
    ];

    fn assistant(llm: &Arc<ScriptedLlm>, retriever: Arc<StaticRetriever>) -> LoanAssistant {
        LoanAssistant::new(llm.client(), retriever, 4).unwrap()
    }

    #[tokio::test]
    async fn rate_question_is_answered_from_context() {
        let llm = Arc::new(ScriptedLlm::new(
            "rate",
            "Personal loan rates range from 6.5% to 18% APR.",
        ));
        let retriever = Arc::new(StaticRetriever::new(&POLICY));
        let outcome = assistant(&llm, retriever.clone())
            .run("What is the current interest rate?")
            .await
            .unwrap();

        let state = &outcome.state;
        assert_eq!(state.intent, Some(Intent::Rate));
        assert_eq!(state.retrieved_docs.len(), 4);
        assert!(!state.escalate_to_human());
        assert_eq!(
            state.validated_answer(),
            Some("Personal loan rates range from 6.5% to 18% APR.")
        );
        let answer = state.final_answer().unwrap();
        assert_eq!(
            answer,
            "Thank you for asking. Personal loan rates range from 6.5% to 18% APR."
        );
        assert!(!answer.contains(INSUFFICIENT_CONTEXT));
        assert_eq!(
            outcome.path,
            [NodeId::Classify, NodeId::Retrieve, NodeId::Validate, NodeId::Format]
        );
        assert_eq!(retriever.calls(), 1);
    }

    #[tokio::test]
    async fn validation_sees_context_in_retrieved_order() {
        let llm = Arc::new(ScriptedLlm::new("rate", "Rates start at 6.5%."));
        let retriever = Arc::new(StaticRetriever::new(&POLICY));
        assistant(&llm, retriever)
            .query("What is the current interest rate?")
            .await
            .unwrap();

        let turns = llm.turns_for(Stage::Validate);
        assert_eq!(turns[0].role, Role::System);
        assert!(turns[0].content.contains(INSUFFICIENT_CONTEXT));
        assert_eq!(turns[1].role, Role::User);
        assert!(turns[1].content.contains(&POLICY.join("\n\n")));
        assert!(turns[1].content.contains("What is the current interest rate?"));
    }

    #[tokio::test]
    async fn unsupported_question_skips_retrieval() {
        let llm = Arc::new(ScriptedLlm::new("unsupported", "unused"));
        let retriever = Arc::new(StaticRetriever::new(&POLICY));
        let outcome = assistant(&llm, retriever.clone())
            .run("What's your favorite color?")
            .await
            .unwrap();

        assert_eq!(outcome.state.final_answer(), Some(ESCALATION_MESSAGE));
        assert!(outcome.state.retrieved_docs.is_empty());
        assert!(outcome.state.escalate_to_human());
        assert_eq!(outcome.path, [NodeId::Classify, NodeId::Format]);
        assert_eq!(retriever.calls(), 0);
        assert_eq!(llm.stages(), [Stage::Classify]);
    }

    #[tokio::test]
    async fn unrecognized_intent_is_treated_as_unsupported() {
        let llm = Arc::new(ScriptedLlm::new("  Mortgage Refinancing\n", "unused"));
        let retriever = Arc::new(StaticRetriever::new(&POLICY));
        let outcome = assistant(&llm, retriever.clone())
            .run("Can I refinance?")
            .await
            .unwrap();

        assert_eq!(
            outcome.state.intent,
            Some(Intent::Unrecognized("mortgage refinancing".to_string()))
        );
        assert_eq!(outcome.state.final_answer(), Some(ESCALATION_MESSAGE));
        assert_eq!(retriever.calls(), 0);
    }

    #[tokio::test]
    async fn no_retrieved_chunks_escalates_without_validation_call() {
        let llm = Arc::new(ScriptedLlm::new("eligibility", "unused"));
        let retriever = Arc::new(StaticRetriever::new(&[]));
        let outcome = assistant(&llm, retriever)
            .run("Am I eligible with a 600 credit score?")
            .await
            .unwrap();

        assert!(outcome.state.escalate_to_human());
        assert!(outcome.state.validated_answer().is_none());
        assert_eq!(outcome.state.final_answer(), Some(ESCALATION_MESSAGE));
        assert_eq!(llm.stages(), [Stage::Classify]);
    }

    #[tokio::test]
    async fn sentinel_anywhere_in_validation_escalates() {
        for validation in [
            INSUFFICIENT_CONTEXT.to_string(),
            format!("Sorry, {INSUFFICIENT_CONTEXT}."),
            format!("The policy mentions rates.\n\n{INSUFFICIENT_CONTEXT}\nPlease ask an agent."),
        ] {
            let llm = Arc::new(ScriptedLlm::new("document", &validation));
            let retriever = Arc::new(StaticRetriever::new(&POLICY));
            let outcome = assistant(&llm, retriever)
                .run("Which documents prove income?")
                .await
                .unwrap();

            assert!(outcome.state.escalate_to_human());
            assert!(outcome.state.validated_answer().is_none());
            assert_eq!(outcome.state.final_answer(), Some(ESCALATION_MESSAGE));
            assert_eq!(llm.stages(), [Stage::Classify, Stage::Validate]);
        }
    }

    #[tokio::test]
    async fn completion_failure_aborts_the_run() {
        let mut scripted = ScriptedLlm::new("rate", "Rates start at 6.5%.");
        scripted.fail_at = Some(Stage::Format);
        let llm = Arc::new(scripted);
        let retriever = Arc::new(StaticRetriever::new(&POLICY));

        let result = assistant(&llm, retriever).query("What is the rate?").await;
        assert!(matches!(
            result,
            Err(PipelineError::Completion(CompletionError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn unbuilt_index_fails_the_run() {
        let dir = tempdir().unwrap();
        let index = Arc::new(KnowledgeIndex::new(
            dir.path(),
            TextSplitter::default(),
            Arc::new(HashingEmbedder::default()),
            Arc::new(MemoryVectorStore),
        ));
        index.build().await.unwrap();

        let llm = Arc::new(ScriptedLlm::new("rate", "unused"));
        let assistant = LoanAssistant::new(llm.client(), index, 4).unwrap();
        let result = assistant.query("What is the current interest rate?").await;
        assert!(matches!(
            result,
            Err(PipelineError::Index(IndexError::NotReady))
        ));
    }

    #[tokio::test]
    async fn answers_from_a_built_index() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("rates.md"),
            POLICY.join("\n\n").repeat(10),
        )
        .unwrap();
        let index = Arc::new(KnowledgeIndex::new(
            dir.path(),
            TextSplitter::new(500, 100),
            Arc::new(HashingEmbedder::default()),
            Arc::new(MemoryVectorStore),
        ));
        index.build().await.unwrap();

        let llm = Arc::new(ScriptedLlm::new("rate", "Rates range from 6.5% to 18% APR."));
        let assistant = LoanAssistant::new(llm.client(), index, 4).unwrap();
        let outcome = assistant
            .run("What is the current interest rate?")
            .await
            .unwrap();

        assert_eq!(outcome.state.retrieved_docs.len(), 4);
        assert!(outcome
            .state
            .retrieved_docs
            .iter()
            .all(|chunk| chunk.source.ends_with("rates.md")));
        assert!(!outcome.state.escalate_to_human());
        assert!(outcome.state.final_answer().is_some_and(|a| !a.is_empty()));
    }

    #[tokio::test]
    async fn concurrent_runs_keep_separate_state() {
        let llm = Arc::new(ScriptedLlm::new("rate", "Rates start at 6.5%."));
        let retriever = Arc::new(StaticRetriever::new(&POLICY));
        let assistant = assistant(&llm, retriever);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let assistant = assistant.clone();
                tokio::spawn(async move {
                    let query = format!("Question number {i}?");
                    let outcome = assistant.run(&query).await.unwrap();
                    (query, outcome)
                })
            })
            .collect();

        for handle in handles {
            let (query, outcome) = handle.await.unwrap();
            assert_eq!(outcome.state.user_query(), query);
            assert_eq!(
                outcome.state.final_answer(),
                Some("Thank you for asking. Rates start at 6.5%.")
            );
        }
    }
}
