use super::language_model::LanguageModel;
use super::model_output::{parse_model_output, ModelOutput};
use super::news_models::Article;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

const DEFAULT_REASON: &str = "Selected by AI";

/// One entry of the model's selection array. Only JSON objects count;
/// a positional `[3, "why"]` is not a selection.
///
/// Fields stay untyped so a single bad entry (a string index, a float) is
/// skipped instead of failing the whole reply.
type Selection = Map<String, Value>;

/// Article fields shown to the model.
#[derive(Serialize)]
struct PromptArticle<'a> {
    title: &'a str,
    source: &'a str,
    description: &'a str,
    link: &'a str,
}

/// Result of a curation pass.
#[derive(Debug, Clone)]
pub struct Curation {
    pub articles: Vec<Article>,
    /// True when the model's answer was unusable and the first N inputs
    /// were taken as-is.
    pub fallback: bool,
}

pub struct CurationService {
    model: Arc<dyn LanguageModel>,
}

impl CurationService {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Asks the model for the `top_n` most relevant articles.
    ///
    /// Output order follows the model's answer. Any model error or
    /// unparseable answer yields the first `top_n` inputs in fetch order.
    pub async fn select_top(&self, articles: &[Article], top_n: usize, api_key: &str) -> Curation {
        if articles.is_empty() {
            tracing::warn!("No articles to curate");
            return Curation {
                articles: Vec::new(),
                fallback: false,
            };
        }

        tracing::info!(
            candidates = articles.len(),
            top_n,
            "Asking model to select top articles"
        );

        let prompt = build_curation_prompt(articles, top_n);

        let reply = match self.model.generate(api_key, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "Model call failed during article selection");
                return fallback(articles, top_n);
            }
        };

        match parse_model_output::<Vec<Selection>>(&reply) {
            ModelOutput::Parsed(selections) => {
                let selected = apply_selections(articles, selections);
                if selected.is_empty() {
                    tracing::warn!("Model selection referenced no valid article");
                    return fallback(articles, top_n);
                }
                tracing::info!(selected = selected.len(), "Model selected articles");
                Curation {
                    articles: selected,
                    fallback: false,
                }
            }
            ModelOutput::Malformed(reason) => {
                tracing::warn!(%reason, raw = %reply, "Could not parse selection from model reply");
                fallback(articles, top_n)
            }
        }
    }
}

fn fallback(articles: &[Article], top_n: usize) -> Curation {
    Curation {
        articles: articles.iter().take(top_n).cloned().collect(),
        fallback: true,
    }
}

fn apply_selections(articles: &[Article], selections: Vec<Selection>) -> Vec<Article> {
    selections
        .into_iter()
        .filter_map(|selection| {
            let index = selection.get("index")?.as_u64()? as usize;
            let mut article = articles.get(index)?.clone();
            let reason = selection
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_REASON);
            article.selection_reason = Some(reason.to_string());
            Some(article)
        })
        .collect()
}

fn build_curation_prompt(articles: &[Article], top_n: usize) -> String {
    let listing: Vec<PromptArticle<'_>> = articles
        .iter()
        .map(|a| PromptArticle {
            title: &a.title,
            source: &a.source,
            description: &a.content,
            link: &a.link,
        })
        .collect();
    let listing = serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are an expert curator of business and technology news. \
I have {count} articles and need the {top_n} most relevant, impactful and interesting ones.\n\n\
Criteria:\n\
1. Significant technological innovation, major business deals, or industry-shifting news.\n\
2. Reputable sources first.\n\
3. A diverse spread of topics.\n\
4. Timely stories with long-term impact.\n\
5. No duplicate or near-duplicate topics.\n\n\
Articles (title, source, description, link), indexed from 0:\n\n{listing}\n\n\
Select exactly {top_n} articles. Answer strictly as a JSON array of objects:\n\
{{\"index\": <index in the list above>, \"reason\": \"<one-line reason>\"}}\n\n\
Return only the JSON array, with no other text.",
        count = articles.len(),
    )
}
