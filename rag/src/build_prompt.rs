use serde::Serialize;

use crate::vector_index::Hit;

/// Fixed reply the model is told to give when the context lacks the answer.
pub const NOT_IN_CONTEXT_REPLY: &str =
    "I could not find this information in the provided documents.";

/// Grounding rules sent as the system instruction.
pub fn system_prompt() -> String {
    format!(
        "You answer questions about the user's PDF documents. \
Use ONLY the numbered context passages supplied with the question. \
Do not use outside knowledge and do not guess. \
If the context does not contain the answer, reply exactly: \"{}\" \
When you do answer, mention the source file and page you relied on.",
        NOT_IN_CONTEXT_REPLY
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

pub fn build_prompt_with_context(question: &str, hits: &[Hit]) -> (Vec<Message>, String) {
    let context = format_context_from_hits(hits);

    let user_content = format!(
        "Answer the question using only the context below. If the answer is not in the context, reply exactly: \"{}\"\n\nContext:\n{}\n\nQuestion: {}",
        NOT_IN_CONTEXT_REPLY, context, question
    );

    let messages = vec![
        Message::new(Role::System, system_prompt()),
        Message::new(Role::User, user_content),
    ];

    (messages, context)
}

pub fn format_context_from_hits(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return "(no context found)".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {} ({})\n{}",
                i + 1,
                hit.source.filename,
                hit.source.pages_label(),
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
