/// Wrap the assembled context and the user question into the generation prompt.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a helpful AI assistant that answers questions based on provided documents.\n\n\
         {context}\n\n\
         USER QUESTION: {query}\n\n\
         INSTRUCTIONS:\n\
         1. Answer the question using ONLY the information from the context above\n\
         2. Be specific and cite which document(s) you're referencing\n\
         3. If the context doesn't contain enough information to answer fully, acknowledge that\n\
         4. Provide a clear, well-structured answer\n\
         5. If possible, synthesize information from multiple documents\n\
         6. Be concise but comprehensive\n\n\
         ANSWER:"
    )
}
