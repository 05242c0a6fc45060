//! Grounded prompt assembly.
//!
//! Pure functions, no I/O: retrieved snippets become a labeled context
//! block, merged with the user's question into a single prompt. Company
//! knowledge takes precedence over document-specific details unless the
//! question is explicitly about the document.

use crate::models::{RetrievedMatch, SourceMeta};

/// Render matches as 1-indexed `[Document N]:` blocks in retrieval rank
/// order, joined by a separator. Empty input renders as an empty string.
pub fn format_context(matches: &[RetrievedMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }

    matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("[Document {}]:\n{}\n", i + 1, m.chunk.content))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Build the full grounded prompt.
///
/// With no matches the context block is omitted entirely and the result is
/// still a valid ungrounded prompt, never empty or malformed.
pub fn build_prompt(
    matches: &[RetrievedMatch],
    intent: &str,
    source_meta: Option<&SourceMeta>,
) -> String {
    let mut prompt = String::from(
        "You are a knowledgeable AI assistant representing our company. \
         You have comprehensive knowledge about our business, services, pricing, \
         team, success stories, and processes. ",
    );

    if let Some(meta) = source_meta {
        prompt.push_str(&format!(
            "The client {} is currently viewing a document titled \"{}\". ",
            meta.client_name, meta.title
        ));
    }

    prompt.push_str(
        "\n\nYour primary role is to:\n\
         1. Answer questions about our company, services, and capabilities\n\
         2. Provide information about pricing, processes, and timelines\n\
         3. Share relevant success stories and case studies\n\
         4. Address any concerns or questions the client may have\n\
         5. Reference specific document details when relevant\n\n\
         Use the following context to answer the user's question accurately and \
         professionally. Always prioritize company knowledge over document-specific \
         information unless the question is explicitly about the document.\n\n",
    );

    let context = format_context(matches);
    if !context.is_empty() {
        prompt.push_str(&format!("Available Context:\n{context}\n\n"));
    }

    prompt.push_str(&format!(
        "User Question: {intent}\n\nProvide a helpful, professional response:"
    ));

    prompt
}
