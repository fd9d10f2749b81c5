//! Digest lookup against the local image store

use super::DigestSource;
use crate::error::DockyardResult;
use crate::orchestration::ContainerRuntime;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves digests through the container runtime's image store
pub struct LocalDigestSource {
    runtime: Arc<dyn ContainerRuntime>,
}

impl LocalDigestSource {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl DigestSource for LocalDigestSource {
    async fn digest(&self, tag: &str) -> DockyardResult<String> {
        self.runtime.image_digest(tag).await
    }

    /// Local images are addressed by tag; the ID is only a trust check
    fn result_tag(&self, tag: &str, _digest: &str) -> String {
        tag.to_string()
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
