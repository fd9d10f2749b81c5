//! Hit/miss classification
//!
//! An artifact is a hit only when its fresh content hash equals the stored
//! one AND the image store still reports the stored image. Any failure
//! along the way degrades that artifact to a miss instead of failing the
//! build.

use super::hash::hash_artifact;
use super::store::CacheStore;
use crate::artifact::Artifact;
use crate::deps::DependencyLister;
use crate::digest::DigestSource;
use futures_util::future::join_all;
use std::fmt;
use tracing::{debug, warn};

/// Outcome of checking one artifact against the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDetails {
    /// Reuse the stored image
    Hit {
        /// Content hash the stored entry was confirmed against
        hash: String,
        /// Tag handed back to the caller
        tag: String,
        /// Digest the image store confirmed
        digest: String,
    },
    /// Must be built
    Miss {
        /// Fresh content hash, if it could be computed
        hash: Option<String>,
        reason: MissReason,
    },
}

impl CacheDetails {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

/// Why an artifact has to be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// Dependencies could not be hashed
    HashFailed(String),
    /// Nothing cached for this artifact
    NotCached,
    /// Inputs changed since the cached build
    HashChanged,
    /// Cached image no longer exists (or lookup failed)
    ImageMissing(String),
    /// Image store reports a different image under the cached tag
    DigestChanged { expected: String, found: String },
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashFailed(e) => write!(f, "could not hash dependencies: {}", e),
            Self::NotCached => write!(f, "not cached"),
            Self::HashChanged => write!(f, "inputs changed"),
            Self::ImageMissing(e) => write!(f, "cached image unavailable: {}", e),
            Self::DigestChanged { expected, found } => {
                write!(f, "digest changed from {} to {}", expected, found)
            }
        }
    }
}

/// Classify every artifact, keeping input order
///
/// Hashing and digest lookups for different artifacts are independent,
/// so they run concurrently. The store is only read here.
pub async fn resolve(
    artifacts: &[Artifact],
    store: &CacheStore,
    lister: &dyn DependencyLister,
    digest_source: &dyn DigestSource,
) -> Vec<CacheDetails> {
    join_all(
        artifacts
            .iter()
            .map(|artifact| resolve_one(artifact, store, lister, digest_source)),
    )
    .await
}

async fn resolve_one(
    artifact: &Artifact,
    store: &CacheStore,
    lister: &dyn DependencyLister,
    digest_source: &dyn DigestSource,
) -> CacheDetails {
    let hash = match hash_artifact(lister, artifact).await {
        Ok(hash) => hash,
        Err(e) => {
            warn!("{}: {}. Forcing rebuild", artifact.image, e);
            return CacheDetails::Miss {
                hash: None,
                reason: MissReason::HashFailed(e.to_string()),
            };
        }
    };

    let Some(entry) = store.get(&artifact.image) else {
        return CacheDetails::Miss {
            hash: Some(hash),
            reason: MissReason::NotCached,
        };
    };

    if entry.hash != hash {
        debug!("{}: hash changed", artifact.image);
        return CacheDetails::Miss {
            hash: Some(hash),
            reason: MissReason::HashChanged,
        };
    }

    let digest = match digest_source.digest(&entry.tag).await {
        Ok(digest) => digest,
        Err(e) => {
            if e.is_cache_recoverable() {
                debug!(
                    "{}: {} lookup of {} failed: {}",
                    artifact.image,
                    digest_source.name(),
                    entry.tag,
                    e
                );
            } else {
                warn!(
                    "{}: {} lookup of {} failed: {}. Forcing rebuild",
                    artifact.image,
                    digest_source.name(),
                    entry.tag,
                    e
                );
            }
            return CacheDetails::Miss {
                hash: Some(hash),
                reason: MissReason::ImageMissing(e.to_string()),
            };
        }
    };

    if let Some(ref expected) = entry.digest {
        if *expected != digest {
            return CacheDetails::Miss {
                hash: Some(hash),
                reason: MissReason::DigestChanged {
                    expected: expected.clone(),
                    found: digest,
                },
            };
        }
    }

    CacheDetails::Hit {
        tag: digest_source.result_tag(&entry.tag, &digest),
        hash,
        digest,
    }
}
