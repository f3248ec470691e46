/// Closing tag emitted by reasoning models after their hidden chain of
/// thought.
pub const REASONING_CLOSE: &str = "</think>";

/// Returns the answer part of a completion: everything after the last
/// closing reasoning tag, trimmed. Completions without the tag come back
/// unchanged.
pub fn strip_reasoning(completion: &str) -> &str {
    match completion.rfind(REASONING_CLOSE) {
        Some(pos) => completion[pos + REASONING_CLOSE.len()..].trim(),
        None => completion,
    }
}
