//! Content hashing for artifacts
//!
//! The hash covers the artifact's build configuration and every file its
//! build reads. Two builds with the same hash are expected to produce the
//! same image, so the hash is the only reuse criterion the cache applies.

use crate::artifact::{Artifact, ArtifactType};
use crate::deps::DependencyLister;
use crate::error::{DockyardError, DockyardResult};
use sha2::{Digest, Sha256};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Bumped whenever the hash layout changes, invalidating old entries
const HASH_VERSION: &[u8] = b"dockyard-artifact-hash-v1";

/// Compute the content hash of an artifact
///
/// Dependencies are sorted by path first, so the order in which the lister
/// discovers files does not affect the result.
pub async fn hash_artifact(
    lister: &dyn DependencyLister,
    artifact: &Artifact,
) -> DockyardResult<String> {
    let deps = lister
        .dependencies_for_artifact(artifact)
        .await
        .map_err(|e| match e {
            DockyardError::DependencyResolution { .. } => e,
            other => DockyardError::DependencyResolution {
                image: artifact.image.clone(),
                reason: other.to_string(),
            },
        })?;

    let config = hashed_config(&artifact.kind)?;

    let mut entries = Vec::with_capacity(deps.len());
    for dep in deps {
        let digest = hash_dependency(&artifact.workspace, &dep)
            .await
            .map_err(|e| DockyardError::DependencyResolution {
                image: artifact.image.clone(),
                reason: e.to_string(),
            })?;
        entries.push((dep, digest));
    }

    let hash = fold(&config, entries);
    debug!("{}: content hash {}", artifact.image, &hash[..12]);
    Ok(hash)
}

/// Artifact configuration as the build will see it
///
/// Build args without a value are taken from the environment at build
/// time, so they are filled in here and a changed variable changes the hash.
fn hashed_config(kind: &ArtifactType) -> DockyardResult<Vec<u8>> {
    let mut kind = kind.clone();
    if let ArtifactType::Docker(ref mut docker) = kind {
        for (key, value) in docker.build_args.iter_mut() {
            if value.is_none() {
                *value = env::var(key).ok();
            }
        }
    }
    Ok(serde_json::to_vec(&kind)?)
}

/// Combine configuration and per-file digests into the final hash
fn fold(config: &[u8], mut entries: Vec<(PathBuf, Vec<u8>)>) -> String {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.dedup_by(|a, b| a.0 == b.0);

    let mut hasher = Sha256::new();
    hasher.update(HASH_VERSION);
    hasher.update((config.len() as u64).to_le_bytes());
    hasher.update(config);

    for (path, digest) in &entries {
        let path = path.to_string_lossy();
        hasher.update((path.len() as u64).to_le_bytes());
        hasher.update(path.as_bytes());
        hasher.update(digest);
    }

    hex::encode(hasher.finalize())
}

/// Digest one dependency: its kind plus content (files) or target (links)
async fn hash_dependency(workspace: &Path, dep: &Path) -> DockyardResult<Vec<u8>> {
    let path = workspace.join(dep);
    let metadata = fs::symlink_metadata(&path)
        .await
        .map_err(|e| DockyardError::io(format!("reading metadata of {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    let file_type = metadata.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(&path)
            .await
            .map_err(|e| DockyardError::io(format!("reading link {}", path.display()), e))?;
        hasher.update(b"link\0");
        hasher.update(target.to_string_lossy().as_bytes());
    } else if file_type.is_file() {
        let content = fs::read(&path)
            .await
            .map_err(|e| DockyardError::io(format!("reading {}", path.display()), e))?;
        hasher.update(b"file\0");
        hasher.update(executable_marker(&metadata));
        hasher.update(&content);
    } else {
        hasher.update(b"other\0");
    }

    Ok(hasher.finalize().to_vec())
}

#[cfg(unix)]
fn executable_marker(metadata: &std::fs::Metadata) -> &'static [u8] {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        b"x"
    } else {
        b"-"
    }
}

#[cfg(not(unix))]
fn executable_marker(_metadata: &std::fs::Metadata) -> &'static [u8] {
    b"-"
}
