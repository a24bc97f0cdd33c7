/// Returned by the validator when the context does not support an answer.
pub const INSUFFICIENT_CONTEXT: &str = "INSUFFICIENT_CONTEXT";

/// Fixed reply whenever a question is handed to a loan specialist.
pub const ESCALATION_MESSAGE: &str = "Thanks for your question. A loan specialist will review \
    your request and follow up with you shortly to ensure accuracy.";

pub(crate) fn classify_query(query: &str) -> String {
    format!(
        "Classify the following loan-related user query into one category.\n\n\
         Categories:\n\
         - informational\n\
         - eligibility\n\
         - rate\n\
         - document\n\
         - unsupported\n\n\
         Query:\n\"{query}\"\n\n\
         Return ONLY the category name."
    )
}

pub(crate) fn validate_retrieval_system() -> String {
    format!(
        "You are a lending policy assistant. \
         You must answer strictly using the provided context. \
         Do not guess, infer, or add information that is not explicitly stated. \
         If the context does not fully support an answer, respond with exactly {INSUFFICIENT_CONTEXT}."
    )
}

pub(crate) fn validate_retrieval_user(context: &str, query: &str) -> String {
    format!(
        "Context:\n{context}\n\n\
         Question:\n{query}\n\n\
         If the answer cannot be fully derived from the context, respond with EXACTLY this phrase:\n\n\
         {INSUFFICIENT_CONTEXT}"
    )
}

pub(crate) fn format_answer(answer: &str) -> String {
    format!(
        "Rewrite the following answer in a clear, professional, customer-friendly tone. \
         Do NOT add new information or modify the meaning.\n\n\
         Answer:\n{answer}"
    )
}
