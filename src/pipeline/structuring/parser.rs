use serde_json::Value;

use super::QueryError;

/// Parse the model's final text into a JSON value.
///
/// Models sometimes wrap JSON in Markdown fences or add a sentence before it,
/// so fenced blocks and the outermost `{...}` span are tried in turn.
/// Anything that still does not parse counts as no usable output.
pub fn parse_model_json(response: &str) -> Result<Value, QueryError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(QueryError::EmptyModelResponse);
    }

    for candidate in json_candidates(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.is_null() {
                return Err(QueryError::EmptyModelResponse);
            }
            return Ok(value);
        }
    }

    tracing::warn!(
        response_len = trimmed.len(),
        "Model output is not parsable JSON"
    );
    Err(QueryError::EmptyModelResponse)
}

fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];

    if let Some(fenced) = fenced_block(text) {
        candidates.push(fenced);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

/// Contents of the first ```json (or bare ```) fenced block.
fn fenced_block(text: &str) -> Option<&str> {
    let fence_start = text.find("```")?;
    let after_fence = &text[fence_start + 3..];
    // Skip the info string ("json", "JSON", ...) up to the end of the line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let body_end = body.find("```")?;
    Some(body[..body_end].trim())
}
