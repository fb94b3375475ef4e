use super::key_pool::KeyPool;
use super::language_model::LanguageModel;
use super::model_output::{parse_model_output, ModelOutput};
use super::news_models::ArticleSummary;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Article content beyond this many characters is not sent to the model.
pub const MAX_CONTENT_CHARS: usize = 10_000;
const MAX_ATTEMPTS: usize = 3;
/// Alternate keys are only drawn from the head of the pool.
const ALTERNATE_KEY_WINDOW: usize = 3;

const NO_SUMMARY: &str = "No summary available";
const NO_TAKEAWAY: &str = "No key takeaway available";

/// Models sometimes answer the summary as a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummaryText {
    Text(String),
    Lines(Vec<String>),
}

impl SummaryText {
    fn into_text(self) -> String {
        match self {
            SummaryText::Text(text) => text,
            SummaryText::Lines(lines) => lines.join("\n"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    summary: Option<SummaryText>,
    #[serde(default)]
    key_takeaway: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub struct SummaryService {
    model: Arc<dyn LanguageModel>,
}

impl SummaryService {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Summarizes one article, retrying with a different key on failure.
    ///
    /// Never fails: after the last attempt the error stub is returned.
    pub async fn summarize(&self, title: &str, content: &str, keys: &mut KeyPool) -> ArticleSummary {
        let prompt = build_summary_prompt(title, content);
        let mut tried: HashSet<String> = HashSet::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let key = pick_key(keys, &tried);
            tried.insert(key.clone());

            let reply = match self.model.generate(&key, &prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(attempt, %title, error = %e, "Summarization call failed");
                    continue;
                }
            };

            let payload = match parse_model_output::<SummaryPayload>(&reply) {
                ModelOutput::Parsed(payload) => payload,
                ModelOutput::Malformed(reason) => {
                    tracing::warn!(attempt, %title, %reason, "Could not parse summary reply");
                    continue;
                }
            };

            let summary = payload
                .summary
                .map(SummaryText::into_text)
                .unwrap_or_else(|| NO_SUMMARY.to_string());

            if summary.trim().to_lowercase().starts_with("error") {
                tracing::warn!(attempt, %title, "Model returned an error summary");
                continue;
            }

            return ArticleSummary {
                summary,
                key_takeaway: payload
                    .key_takeaway
                    .unwrap_or_else(|| NO_TAKEAWAY.to_string()),
                title: payload
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| title.to_string()),
                fallback: false,
            };
        }

        tracing::error!(%title, attempts = MAX_ATTEMPTS, "Giving up on summary, using error stub");
        ArticleSummary::error_stub(title)
    }
}

/// Draws the next key, swapping in an untried key from the head of the pool
/// when rotation lands on one already used for this article.
fn pick_key(keys: &mut KeyPool, tried: &HashSet<String>) -> String {
    let drawn = keys.next_key().to_string();
    if !tried.contains(&drawn) {
        return drawn;
    }

    let alternatives: Vec<&String> = keys
        .keys()
        .iter()
        .take(ALTERNATE_KEY_WINDOW)
        .filter(|k| !tried.contains(*k))
        .collect();

    alternatives
        .choose(&mut rand::thread_rng())
        .map(|k| (*k).clone())
        .unwrap_or(drawn)
}

fn build_summary_prompt(title: &str, content: &str) -> String {
    let content: String = content.chars().take(MAX_CONTENT_CHARS).collect();

    format!(
        "Summarize the following article for a presentation slide.\n\
Article title: \"{title}\"\n\n\
Instructions:\n\
1. Write a concise, informative summary of 3-5 sentences, each sentence on its own line.\n\
2. Put a period only at the real end of each sentence. Keep abbreviations such as \"U.S.\", \"U.K.\", \"a.m.\" intact.\n\
3. Add one short key takeaway that captures the main point.\n\
4. Optionally suggest a better title.\n\n\
Article content:\n{content}\n\n\
Answer strictly as one JSON object:\n\
{{\"summary\": \"<summary, one sentence per line>\", \"key_takeaway\": \"<key takeaway>\", \"title\": \"<suggested title, or the original>\"}}\n\n\
Return only the JSON object, with no other text."
    )
}
