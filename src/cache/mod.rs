//! Artifact build cache
//!
//! Skips rebuilding artifacts whose inputs have not changed since their
//! last successful build, provided the image from that build still exists.
//!
//! # Flow
//!
//! | Step | Where | Description |
//! |------|-------|-------------|
//! | Hash | [`hash`] | Content hash over build config and dependency files |
//! | Resolve | [`retrieve`] | Compare with the store, confirm the image digest |
//! | Build | [`crate::build::Builder`] | Only the misses |
//! | Record | [`store`] | One entry per built artifact, flushed once |

pub mod hash;
pub mod retrieve;
pub mod store;

pub use hash::hash_artifact;
pub use retrieve::{resolve, CacheDetails, MissReason};
pub use store::{CacheEntry, CacheStore};

use crate::artifact::{Artifact, BuildResult, ImageTags};
use crate::build::Builder;
use crate::config::{CacheConfig, ConfigManager};
use crate::deps::DependencyLister;
use crate::digest::{split_digest, DigestSource};
use crate::error::{DockyardError, DockyardResult};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Wraps a [`Builder`], building only what changed
pub struct ArtifactCache {
    enabled: bool,
    cache_file: PathBuf,
    digest_source: Arc<dyn DigestSource>,
    lister: Arc<dyn DependencyLister>,
}

impl ArtifactCache {
    pub fn new(
        config: &CacheConfig,
        digest_source: Arc<dyn DigestSource>,
        lister: Arc<dyn DependencyLister>,
    ) -> Self {
        Self {
            enabled: config.enabled,
            cache_file: config
                .file
                .clone()
                .unwrap_or_else(ConfigManager::default_cache_file),
            digest_source,
            lister,
        }
    }

    /// Location of the persisted store
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Build `artifacts`, reusing cached images where possible
    ///
    /// Returns one result per artifact in input order. Builder errors are
    /// returned unchanged and leave the cache file untouched. A failure to
    /// write the cache file is only reported as a warning.
    pub async fn build(
        &self,
        out: &mut (dyn Write + Send),
        tags: &ImageTags,
        artifacts: &[Artifact],
        builder: &dyn Builder,
    ) -> DockyardResult<Vec<BuildResult>> {
        reject_duplicates(artifacts)?;

        if !self.enabled {
            debug!("Cache disabled, building {} artifact(s)", artifacts.len());
            return builder.build_and_test(out, tags, artifacts).await;
        }

        let mut store = CacheStore::load(&self.cache_file).await;

        let _ = writeln!(out, "Checking cache...");
        let details = resolve(
            artifacts,
            &store,
            self.lister.as_ref(),
            self.digest_source.as_ref(),
        )
        .await;

        let mut needs_build = Vec::new();
        for (artifact, detail) in artifacts.iter().zip(&details) {
            match detail {
                CacheDetails::Hit { tag, .. } => {
                    debug!("{}: cache hit as {}", artifact.image, tag);
                    let _ = writeln!(out, " - {}: Found", artifact.image);
                }
                CacheDetails::Miss { reason, .. } => {
                    debug!("{}: cache miss ({})", artifact.image, reason);
                    let _ = writeln!(out, " - {}: Not found. Building", artifact.image);
                    needs_build.push(artifact.clone());
                }
            }
        }

        let mut built: HashMap<String, BuildResult> = if needs_build.is_empty() {
            HashMap::new()
        } else {
            builder
                .build_and_test(out, tags, &needs_build)
                .await?
                .into_iter()
                .map(|result| (result.image_name.clone(), result))
                .collect()
        };

        let mut results = Vec::with_capacity(artifacts.len());
        for (artifact, detail) in artifacts.iter().zip(details) {
            match detail {
                CacheDetails::Hit { hash, tag, digest } => {
                    let (stored_tag, _) = split_digest(&tag);
                    store.put(
                        artifact.image.clone(),
                        CacheEntry::new(hash, stored_tag, Some(digest)),
                    );
                    results.push(BuildResult::new(artifact.image.clone(), tag));
                }
                CacheDetails::Miss { hash, .. } => {
                    let result = built
                        .remove(&artifact.image)
                        .ok_or_else(|| DockyardError::MissingBuildResult(artifact.image.clone()))?;
                    if let Some(hash) = hash {
                        store.put(artifact.image.clone(), self.entry_for(hash, &result).await);
                    }
                    results.push(result);
                }
            }
        }

        if let Err(e) = store.flush(&self.cache_file).await {
            warn!("{}", e);
            let _ = writeln!(out, "Warning: {}", e);
        } else {
            info!(
                "Cache updated: {} hit(s), {} built",
                artifacts.len() - needs_build.len(),
                needs_build.len()
            );
        }

        Ok(results)
    }

    /// Entry for a freshly built artifact
    ///
    /// The stored tag never carries a digest. When the builder did not pin
    /// one, the digest source is asked; if that fails the digest stays
    /// unknown and the next hit is confirmed by existence only.
    async fn entry_for(&self, hash: String, result: &BuildResult) -> CacheEntry {
        let (tag, pinned) = split_digest(&result.tag);
        let digest = match pinned {
            Some(digest) => Some(digest.to_string()),
            None => match self.digest_source.digest(tag).await {
                Ok(digest) => Some(digest),
                Err(e) => {
                    warn!(
                        "Could not get digest for {} after build: {}",
                        result.image_name, e
                    );
                    None
                }
            },
        };
        CacheEntry::new(hash, tag, digest)
    }
}

fn reject_duplicates(artifacts: &[Artifact]) -> DockyardResult<()> {
    let mut seen = HashSet::new();
    for artifact in artifacts {
        if !seen.insert(artifact.image.as_str()) {
            return Err(DockyardError::DuplicateArtifact(artifact.image.clone()));
        }
    }
    Ok(())
}
