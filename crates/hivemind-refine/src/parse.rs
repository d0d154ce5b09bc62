//! JSON extraction from model responses that wrap their payload in code
//! fences or surrounding prose.

/// Pull the JSON object out of a raw response: strips markdown fences,
/// then takes the outermost `{ ... }` span.
pub(crate) fn extract_json(raw: &str) -> Option<String> {
    let defenced = raw.replace("```json", "").replace("```", "");
    let trimmed = defenced.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(trimmed[start..=end].to_string())
}
