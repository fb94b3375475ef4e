pub mod curation_service;
pub mod key_pool;
pub mod language_model;
pub mod model_output;
pub mod news_models;
pub mod summary_service;

pub use curation_service::{Curation, CurationService};
pub use key_pool::{KeyPool, KeyPoolError};
pub use language_model::LanguageModel;
pub use news_models::{Article, ArticleSummary, SlideArticle};
pub use summary_service::SummaryService;

#[cfg(test)]
pub(crate) mod test_support {
    use super::{Article, LanguageModel};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    /// Model that replays canned replies and records the keys it was given.
    /// Once the script runs out every call fails.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        keys: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                keys: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn keys_used(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(
            &self,
            api_key: &str,
            prompt: &str,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.keys.lock().unwrap().push(api_key.to_string());
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(e.into()),
                None => Err("script exhausted".into()),
            }
        }
    }

    pub fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            source: "Wire".to_string(),
            time: "2026-10-17T08:00:00Z".to_string(),
            link: format!("https://news.example/{}", title.replace(' ', "-")),
            content: format!("Content of {}", title),
            image: None,
            selection_reason: None,
        }
    }
}
