use super::query::Intent;
use crate::knowledge::DocumentChunk;

/// Per-query record threaded through every pipeline task.
///
/// A fresh value is created for each run and owned by that run alone.
#[derive(Debug, Clone)]
pub struct AgentState {
    user_query: String,
    pub intent: Option<Intent>,
    pub retrieved_docs: Vec<DocumentChunk>,
    validated_answer: Option<String>,
    final_answer: Option<String>,
    escalate_to_human: bool,
}

impl AgentState {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            intent: None,
            retrieved_docs: Vec::new(),
            validated_answer: None,
            final_answer: None,
            escalate_to_human: false,
        }
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn validated_answer(&self) -> Option<&str> {
        self.validated_answer.as_deref()
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn escalate_to_human(&self) -> bool {
        self.escalate_to_human
    }

    /// Hands the query to a person; drops any grounded answer.
    pub fn escalate(&mut self) {
        self.escalate_to_human = true;
        self.validated_answer = None;
    }

    pub fn accept(&mut self, answer: String) {
        self.escalate_to_human = false;
        self.validated_answer = Some(answer);
    }

    pub(crate) fn finish(&mut self, answer: String) {
        debug_assert!(self.final_answer.is_none(), "final answer set twice");
        self.final_answer = Some(answer);
    }

    pub fn into_final_answer(self) -> Option<String> {
        self.final_answer
    }
}
