pub mod expiry_scheduler;
pub mod share_service;

pub use expiry_scheduler::ShutdownPolicy;
pub use share_service::{
    ArtifactPublisher, FileHost, ShareError, ShareLink, ShareService, PPTX_MIME_TYPE,
};
