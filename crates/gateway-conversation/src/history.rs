use gateway_core::{trim_history, Message};

/// True if `candidate` duplicates an already-kept message: same id, or same
/// `(role, content)` within a 1 second timestamp window (spec §4.F step 3).
fn is_duplicate(kept: &[Message], candidate: &Message) -> bool {
    kept.iter().any(|m| {
        m.id == candidate.id
            || (m.role == candidate.role
                && m.content == candidate.content
                && (m.timestamp_ms - candidate.timestamp_ms).abs() <= 1_000)
    })
}

/// Merges the session log with an optional external history, de-duplicates,
/// sorts by timestamp ascending, then trims to `max_history_length`
/// preserving tool context (spec §4.F step 3, §8 P6).
pub fn merge_and_trim(
    session_log: &[Message],
    external_history: Option<&[Message]>,
    max_history_length: usize,
) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(session_log.len());
    for m in session_log.iter().chain(external_history.into_iter().flatten()) {
        if !is_duplicate(&merged, m) {
            merged.push(m.clone());
        }
    }
    merged.sort_by_key(|m| m.timestamp_ms);
    trim_history(&mut merged, max_history_length);
    merged
}
