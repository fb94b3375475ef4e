//! Typed extraction of JSON payloads from free-form model replies.
//!
//! Models are asked to "return only JSON" but routinely wrap the payload in
//! prose or markdown fences. Instead of slicing between bracket positions,
//! every candidate is run through the real deserializer for the expected
//! type, and the caller gets an explicit tagged result.

use serde::de::DeserializeOwned;

/// Outcome of parsing a model reply against an expected schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    Parsed(T),
    /// No candidate matched the schema. Holds the last decoder error.
    Malformed(String),
}

impl<T> ModelOutput<T> {
    pub fn into_parsed(self) -> Option<T> {
        match self {
            ModelOutput::Parsed(value) => Some(value),
            ModelOutput::Malformed(_) => None,
        }
    }
}

/// Parses `text` as `T`, trying in order: the whole reply, the body of a
/// fenced code block, then a streamed value starting at each `[` or `{`.
pub fn parse_model_output<T: DeserializeOwned>(text: &str) -> ModelOutput<T> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ModelOutput::Malformed("empty response".to_string());
    }

    let mut last_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return ModelOutput::Parsed(value),
        Err(e) => e.to_string(),
    };

    if let Some(body) = fenced_block(trimmed) {
        match serde_json::from_str::<T>(body.trim()) {
            Ok(value) => return ModelOutput::Parsed(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    for (offset, _) in trimmed
        .char_indices()
        .filter(|(_, c)| *c == '[' || *c == '{')
    {
        let mut stream = serde_json::Deserializer::from_str(&trimmed[offset..]).into_iter::<T>();
        match stream.next() {
            Some(Ok(value)) => return ModelOutput::Parsed(value),
            Some(Err(e)) => last_error = e.to_string(),
            None => {}
        }
    }

    ModelOutput::Malformed(last_error)
}

/// Body of the first ``` fenced block, without the language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the info string (e.g. "json") up to the end of the line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}
