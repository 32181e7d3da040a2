//! Prompt construction for note enrichment.

use crate::openai::ChatMessage;

/// System message sent with every enrichment request.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful language learning assistant that responds in JSON format.";

/// Instructional prompt for one note.
pub fn enrichment_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        r#"You are a language learning assistant. A user who speaks {source_language} is learning {target_language}.
They provided this text: "{text}"

Please analyze this text and provide:
1. A breakdown of interesting vocabulary and grammar points
2. A brief explanation of cultural context if relevant
3. Alternative ways to express the same idea
4. Common mistakes learners might make with this phrase

Format your response as a JSON object with two fields:
- "content": detailed educational content about the text
- "tags": an array of 3-5 relevant tags (single words only) for categorizing this note

JSON response only, no additional text."#
    )
}

/// System + user messages for one note.
pub fn enrichment_messages(
    text: &str,
    source_language: &str,
    target_language: &str,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(enrichment_prompt(text, source_language, target_language)),
    ]
}
