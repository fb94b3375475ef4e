pub mod pipeline_service;
pub mod workspace;

pub use pipeline_service::{
    DeckPipeline, ImageFetcher, NewsSource, PipelineError, PipelineReport, PipelineService,
    PipelineSettings,
};
pub use workspace::Workspace;
