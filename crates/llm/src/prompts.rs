//! Prompt template for retrieval-augmented answers

/// Answer template; `{context}` and `{question}` are substituted by [`rag_prompt`]
pub const RAG_TEMPLATE: &str = "You are a helpful assistant with access to COVID-19 medical research.

Answer the question using the following context from recent research papers:
{context}

Question: {question}
Answer: Please provide a comprehensive answer based on the research context. If the context doesn't contain relevant information, please say so clearly.";

/// Join retrieved passages into a single context block
pub fn format_docs<S: AsRef<str>>(passages: &[S]) -> String {
    passages
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the answer template
pub fn rag_prompt(context: &str, question: &str) -> String {
    // Substitute question first so a literal "{question}" inside the context survives
    RAG_TEMPLATE
        .replacen("{question}", question, 1)
        .replacen("{context}", context, 1)
}
