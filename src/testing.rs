//! In-memory collaborators for unit tests

use crate::artifact::{Artifact, BuildResult, ImageTags};
use crate::build::Builder;
use crate::deps::DependencyLister;
use crate::digest::DigestSource;
use crate::error::{DockyardError, DockyardResult};
use crate::orchestration::{BuildSpec, ContainerRuntime};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn fake_digest(seed: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(seed.as_bytes())))
}

/// Dependency lister with fixed file lists per image
#[derive(Default)]
pub struct StaticLister {
    files: HashMap<String, Vec<PathBuf>>,
}

impl StaticLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, image: &str, files: &[&str]) -> Self {
        self.files
            .insert(image.to_string(), files.iter().map(PathBuf::from).collect());
        self
    }
}

#[async_trait]
impl DependencyLister for StaticLister {
    async fn dependencies_for_artifact(&self, artifact: &Artifact) -> DockyardResult<Vec<PathBuf>> {
        self.files
            .get(&artifact.image)
            .cloned()
            .ok_or_else(|| DockyardError::DependencyResolution {
                image: artifact.image.clone(),
                reason: "unknown artifact".to_string(),
            })
    }
}

/// Digest source over an in-memory tag -> digest table
pub struct FakeDigestSource {
    digests: Mutex<HashMap<String, String>>,
    remote: bool,
    lookups: AtomicUsize,
}

impl FakeDigestSource {
    pub fn local() -> Self {
        Self {
            digests: Mutex::new(HashMap::new()),
            remote: false,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn remote() -> Self {
        Self {
            remote: true,
            ..Self::local()
        }
    }

    pub fn with(self, tag: &str, digest: &str) -> Self {
        self.set(tag, digest);
        self
    }

    pub fn set(&self, tag: &str, digest: &str) {
        self.digests
            .lock()
            .unwrap()
            .insert(tag.to_string(), digest.to_string());
    }

    pub fn remove(&self, tag: &str) {
        self.digests.lock().unwrap().remove(tag);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DigestSource for FakeDigestSource {
    async fn digest(&self, tag: &str) -> DockyardResult<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.digests
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .ok_or_else(|| DockyardError::DigestNotFound(tag.to_string()))
    }

    fn result_tag(&self, tag: &str, digest: &str) -> String {
        if self.remote {
            format!("{}@{}", tag, digest)
        } else {
            tag.to_string()
        }
    }

    fn name(&self) -> &'static str {
        if self.remote {
            "remote"
        } else {
            "local"
        }
    }
}

/// Builder that "builds" by registering images with a digest source
pub struct RecordingBuilder {
    store: Arc<FakeDigestSource>,
    push: bool,
    fail: bool,
    built: Mutex<Vec<String>>,
    generation: AtomicUsize,
}

impl RecordingBuilder {
    pub fn new(store: Arc<FakeDigestSource>, push: bool) -> Self {
        Self {
            store,
            push,
            fail: false,
            built: Mutex::new(Vec::new()),
            generation: AtomicUsize::new(0),
        }
    }

    pub fn failing(store: Arc<FakeDigestSource>) -> Self {
        Self {
            fail: true,
            ..Self::new(store, false)
        }
    }

    /// Images built so far, in build order
    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

#[async_trait]
impl Builder for RecordingBuilder {
    async fn build_and_test(
        &self,
        out: &mut (dyn Write + Send),
        tags: &ImageTags,
        artifacts: &[Artifact],
    ) -> DockyardResult<Vec<BuildResult>> {
        if self.fail {
            return Err(DockyardError::ImageBuild {
                tag: artifacts
                    .first()
                    .map(|a| a.image.clone())
                    .unwrap_or_default(),
                reason: "exit status 1".to_string(),
            });
        }

        let mut results = Vec::new();
        for artifact in artifacts {
            let tag = tags
                .get(&artifact.image)
                .ok_or_else(|| DockyardError::MissingTag(artifact.image.clone()))?;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            let digest = fake_digest(&format!("{}#{}", tag, generation));

            let _ = writeln!(out, "built {}", tag);
            self.store.set(tag, &digest);
            self.built.lock().unwrap().push(artifact.image.clone());

            let result_tag = if self.push {
                format!("{}@{}", tag, digest)
            } else {
                tag.clone()
            };
            results.push(BuildResult::new(artifact.image.clone(), result_tag));
        }
        Ok(results)
    }
}

/// Container runtime keeping images in memory
#[derive(Default)]
pub struct FakeRuntime {
    images: Mutex<HashMap<String, String>>,
    pushed: Mutex<HashMap<String, String>>,
    built: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, tag: &str, id: &str) -> Self {
        self.images
            .lock()
            .unwrap()
            .insert(tag.to_string(), id.to_string());
        self
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn pushed_digest(&self, tag: &str) -> Option<String> {
        self.pushed.lock().unwrap().get(tag).cloned()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> DockyardResult<bool> {
        Ok(true)
    }

    async fn image_digest(&self, image: &str) -> DockyardResult<String> {
        self.images
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .ok_or_else(|| DockyardError::DigestNotFound(image.to_string()))
    }

    async fn build_image(
        &self,
        spec: &BuildSpec,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DockyardResult<()> {
        on_output("STEP 1/1: FROM scratch".to_string());
        let id = fake_digest(&format!("image:{}", spec.tag));
        self.images.lock().unwrap().insert(spec.tag.clone(), id);
        self.built.lock().unwrap().push(spec.tag.clone());
        Ok(())
    }

    async fn push_image(&self, tag: &str) -> DockyardResult<String> {
        if !self.images.lock().unwrap().contains_key(tag) {
            return Err(DockyardError::ImagePush {
                tag: tag.to_string(),
                reason: "image not known".to_string(),
            });
        }
        let digest = fake_digest(&format!("manifest:{}", tag));
        self.pushed
            .lock()
            .unwrap()
            .insert(tag.to_string(), digest.clone());
        Ok(digest)
    }

    fn runtime_name(&self) -> &'static str {
        "Fake"
    }
}
