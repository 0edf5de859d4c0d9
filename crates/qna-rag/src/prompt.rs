//! Chat prompt template for contextual answer extraction
//!
//! A system message describing the assistant plus a user message carrying the
//! retrieved context and the question.

use qna_core::ChatMessage;
use qna_vector::ScoredChunk;

/// Answer the model is told to give when the context does not support one
pub const NOT_FOUND_ANSWER: &str = "Information not found";

pub const SYSTEM_TEMPLATE: &str = "You are an AI tool specialized in extracting answers from PDF documents. \
Your purpose is to assist users in finding specific information or answers to their \
questions by analyzing the content of PDF files";

pub const CONTEXTUAL_ANSWER_TEMPLATE: &str = "In this task, I review the provided context and question to offer an answer based solely on the context, \
citing it if the exact answer is present and indicating 'Information not found' when confidence is low. \
Do not guess the answer if it is not present.

Context:
{context}

Question:
{question}

Please provide the answer as plain text, focusing on precision and adherence to these instructions.";

/// Two-message chat template with `{context}` and `{question}` placeholders
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    system: String,
    user: String,
}

impl ChatPromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Render the system and user messages
    pub fn format_messages(&self, context: &str, question: &str) -> Vec<ChatMessage> {
        let vars = [("context", context), ("question", question)];
        vec![
            ChatMessage::system(render(&self.system, &vars)),
            ChatMessage::user(render(&self.user, &vars)),
        ]
    }
}

impl Default for ChatPromptTemplate {
    fn default() -> Self {
        Self::new(SYSTEM_TEMPLATE, CONTEXTUAL_ANSWER_TEMPLATE)
    }
}

/// Join retrieved chunks into the context block, best match first
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Turn raw model output into the answer string
pub fn parse_answer(raw: &str) -> String {
    raw.trim().to_string()
}

/// Substitute `{name}` placeholders in a single pass, so substituted values
/// are never scanned for placeholders themselves
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let matched = vars.iter().find_map(|(name, value)| {
            after
                .strip_prefix(name)
                .and_then(|tail| tail.strip_prefix('}'))
                .map(|tail| (*value, tail))
        });

        match matched {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qna_core::{ChatRole, DocumentChunk};

    #[test]
    fn test_format_messages() {
        let messages =
            ChatPromptTemplate::default().format_messages("Paris is in France.", "Where is Paris?");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("extracting answers from PDF documents"));
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1]
            .content
            .contains("Context:\nParis is in France.\n\nQuestion:\nWhere is Paris?"));
        assert!(messages[1].content.contains(NOT_FOUND_ANSWER));
        assert!(!messages[1].content.contains("{context}"));
    }

    #[test]
    fn test_render_does_not_expand_inside_values() {
        let rendered = render(
            "{context} | {question} | {other}",
            &[("context", "literal {question}"), ("question", "q?")],
        );
        assert_eq!(rendered, "literal {question} | q? | {other}");
    }

    #[test]
    fn test_format_context_keeps_rank_order() {
        let chunks = vec![
            ScoredChunk {
                chunk: DocumentChunk::new(" second in doc ", 1, "d"),
                score: 0.9,
            },
            ScoredChunk {
                chunk: DocumentChunk::new("first in doc", 0, "d"),
                score: 0.5,
            },
        ];
        assert_eq!(format_context(&chunks), "second in doc\n\nfirst in doc");
    }

    #[test]
    fn test_parse_answer_trims() {
        assert_eq!(parse_answer("\n  Paris.  \n"), "Paris.");
        assert_eq!(parse_answer(NOT_FOUND_ANSWER), NOT_FOUND_ANSWER);
    }
}
