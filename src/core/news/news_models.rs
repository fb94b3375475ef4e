use serde::{Deserialize, Serialize};

/// A single fetched news article.
///
/// Produced by the news source, annotated by the curator. The position in
/// the list is the only identity an article has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub source: String,
    /// Publish time exactly as the news API reported it.
    pub time: String,
    pub link: String,
    /// Full content when the API expanded it, otherwise the description.
    pub content: String,
    /// Remote image URL, if the API provided one.
    pub image: Option<String>,
    /// Why the curator picked this article.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selection_reason: Option<String>,
}

/// What the model produced for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSummary {
    pub summary: String,
    pub key_takeaway: String,
    pub title: String,
    /// True when every attempt failed and this is the error stub.
    pub fallback: bool,
}

impl ArticleSummary {
    pub const ERROR_SUMMARY: &'static str = "Error in summary generation";
    pub const ERROR_TAKEAWAY: &'static str = "Error";

    /// The stub returned once the retry budget is spent.
    pub fn error_stub(original_title: &str) -> Self {
        Self {
            summary: Self::ERROR_SUMMARY.to_string(),
            key_takeaway: Self::ERROR_TAKEAWAY.to_string(),
            title: original_title.to_string(),
            fallback: true,
        }
    }
}

/// The final per-article record the deck is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideArticle {
    pub title: String,
    pub summary: String,
    pub key_takeaway: String,
    pub original_title: String,
    pub source: String,
    pub link: String,
    /// Local path the article image was (or would have been) saved to.
    pub image: String,
}

impl SlideArticle {
    pub fn from_summary(article: &Article, summary: ArticleSummary, image_path: String) -> Self {
        Self {
            title: summary.title,
            summary: summary.summary,
            key_takeaway: summary.key_takeaway,
            original_title: article.title.clone(),
            source: article.source.clone(),
            link: article.link.clone(),
            image: image_path,
        }
    }
}
