use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends a single-turn prompt to the model and returns its text reply.
    ///
    /// The API key is chosen per call by the caller, so one client can serve
    /// a whole rotating key pool.
    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}
