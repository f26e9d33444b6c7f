//! Assembly of the contextual system message.

use semctx_vector_store::{FileChunkMatch, SimilarConversation, SimilarMessage};

/// Appended to text cut short by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = "...";

/// System message used when no context could be retrieved.
pub const BASIC_SYSTEM_MESSAGE: &str = "You are a helpful assistant. Answer the user's \
     request using the conversation so far.";

const CONTEXT_INSTRUCTIONS: &str = "You are a helpful assistant with access to context \
     retrieved from the user's earlier conversations and files. Use it when it is relevant \
     to the current request.";

const CONTEXT_GUIDELINES: &str = "Guidelines:\n\
     - Prefer the current conversation when it disagrees with past context.\n\
     - Mention past context only when it helps answer the request.\n\
     - Name the file when you rely on a file excerpt.";

const CONVERSATION_SUMMARY_CHARS: usize = 300;
const MESSAGE_EXCERPT_CHARS: usize = 400;

/// Cut `text` to at most `max_chars` characters.
///
/// Longer text is cut so that the result, marker included, is exactly
/// `max_chars` characters long and ends in [`TRUNCATION_MARKER`].
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_chars = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_chars {
        return TRUNCATION_MARKER.chars().take(max_chars).collect();
    }

    let mut truncated: String = text.chars().take(max_chars - marker_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Build the system message from retrieved context.
///
/// Sections with no entries are left out. The result never exceeds
/// `max_context_length` characters.
pub fn build_context_message(
    conversations: &[SimilarConversation],
    messages: &[SimilarMessage],
    files: &[FileChunkMatch],
    max_context_length: usize,
) -> String {
    let mut sections = vec![CONTEXT_INSTRUCTIONS.to_string()];

    if !conversations.is_empty() {
        let mut section = String::from("## Relevant past conversations");
        for conversation in conversations {
            let summary = truncate_chars(&conversation.summary, CONVERSATION_SUMMARY_CHARS);
            let similarity = conversation.similarity;
            section.push_str(&format!(
                "\n- {} (similarity {similarity:.2}): {summary}",
                conversation.title
            ));
        }
        sections.push(section);
    }

    if !messages.is_empty() {
        let mut section = String::from("## Relevant past messages");
        for message in messages {
            let content = truncate_chars(&message.content, MESSAGE_EXCERPT_CHARS);
            section.push_str(&format!("\n- [{}] {content}", message.role));
        }
        sections.push(section);
    }

    if !files.is_empty() {
        let mut section = String::from("## Relevant file excerpts");
        for file in files {
            section.push_str(&format!(
                "\n### {} (part {})\n{}",
                file.file_name,
                file.chunk_index + 1,
                file.text
            ));
        }
        sections.push(section);
    }

    sections.push(CONTEXT_GUIDELINES.to_string());
    truncate_chars(&sections.join("\n\n"), max_context_length)
}
