//! Build dependency listing
//!
//! Produces the set of files an artifact's build reads. The cache hashes
//! exactly these files, so anything missing here will not invalidate a
//! cached build.

use crate::artifact::{Artifact, ArtifactType};
use crate::error::{DockyardError, DockyardResult};
use async_trait::async_trait;
use glob::Pattern;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Lists the files an artifact's build depends on
#[async_trait]
pub trait DependencyLister: Send + Sync {
    /// Paths relative to the artifact workspace (absolute paths are kept as-is)
    async fn dependencies_for_artifact(&self, artifact: &Artifact) -> DockyardResult<Vec<PathBuf>>;
}

/// Directory names never treated as build inputs
const ALWAYS_IGNORED: &[&str] = &[".git"];

/// Lists dependencies by inspecting the artifact's workspace
///
/// - Docker artifacts: every file in the build context, minus
///   `.dockerignore` matches, plus the Dockerfile wherever it lives.
/// - Custom artifacts: files matching the declared dependency globs.
#[derive(Debug, Default, Clone)]
pub struct WorkspaceLister;

impl WorkspaceLister {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DependencyLister for WorkspaceLister {
    async fn dependencies_for_artifact(&self, artifact: &Artifact) -> DockyardResult<Vec<PathBuf>> {
        let artifact = artifact.clone();
        tokio::task::spawn_blocking(move || list_blocking(&artifact))
            .await
            .map_err(|e| DockyardError::Internal(format!("dependency listing task failed: {}", e)))?
    }
}

fn list_blocking(artifact: &Artifact) -> DockyardResult<Vec<PathBuf>> {
    let workspace = &artifact.workspace;
    if !workspace.is_dir() {
        return Err(DockyardError::DependencyResolution {
            image: artifact.image.clone(),
            reason: format!("workspace {} is not a directory", workspace.display()),
        });
    }

    let deps = match &artifact.kind {
        ArtifactType::Docker(docker) => {
            let ignore = read_dockerignore(workspace)?;
            let mut deps = walk_context(workspace, &ignore, &artifact.image)?;
            // Ignored or outside the context, the Dockerfile still shapes the build
            let dockerfile = dockerfile_dependency(workspace, &docker.dockerfile);
            if !deps.contains(&dockerfile) {
                deps.push(dockerfile);
                deps.sort();
            }
            deps
        }
        ArtifactType::Custom(custom) => expand_globs(workspace, &custom.dependencies, &artifact.image)?,
    };

    debug!("{}: {} dependencies", artifact.image, deps.len());
    Ok(deps)
}

/// The Dockerfile as a dependency path: relative to the workspace when it
/// lives inside it, otherwise as written (`../Dockerfile`, `/abs/Dockerfile`)
fn dockerfile_dependency(workspace: &Path, dockerfile: &str) -> PathBuf {
    let path = Path::new(dockerfile);
    if path.is_absolute() {
        return path
            .strip_prefix(workspace)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf());
    }
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Parse `.dockerignore` into glob patterns (negations are not supported)
fn read_dockerignore(workspace: &Path) -> DockyardResult<Vec<Pattern>> {
    let path = workspace.join(".dockerignore");
    if !path.exists() {
        return Ok(vec![]);
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| DockyardError::io(format!("reading {}", path.display()), e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let line = line.trim_start_matches("./").trim_end_matches('/');
            match Pattern::new(line) {
                Ok(p) => Some(p),
                Err(e) => {
                    debug!("Skipping invalid .dockerignore pattern {:?}: {}", line, e);
                    None
                }
            }
        })
        .collect())
}

fn is_ignored(relative: &Path, ignore: &[Pattern]) -> bool {
    if relative
        .components()
        .any(|c| ALWAYS_IGNORED.iter().any(|name| c.as_os_str() == *name))
    {
        return true;
    }
    // A pattern matching a directory excludes everything beneath it
    relative
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| ignore.iter().any(|pattern| pattern.matches_path(p)))
}

fn walk_context(workspace: &Path, ignore: &[Pattern], image: &str) -> DockyardResult<Vec<PathBuf>> {
    let mut deps = Vec::new();

    for entry in WalkDir::new(workspace).follow_links(false) {
        let entry = entry.map_err(|e| DockyardError::DependencyResolution {
            image: image.to_string(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(workspace)
            .unwrap_or(entry.path())
            .to_path_buf();
        if is_ignored(&relative, ignore) {
            continue;
        }
        deps.push(relative);
    }

    deps.sort();
    Ok(deps)
}

fn expand_globs(workspace: &Path, patterns: &[String], image: &str) -> DockyardResult<Vec<PathBuf>> {
    let mut deps = Vec::new();

    for pattern in patterns {
        let full_pattern = workspace.join(pattern).to_string_lossy().to_string();
        let paths = glob::glob(&full_pattern).map_err(|e| DockyardError::DependencyResolution {
            image: image.to_string(),
            reason: format!("invalid dependency pattern {}: {}", pattern, e),
        })?;

        for path in paths {
            let path = path.map_err(|e| DockyardError::DependencyResolution {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
            if path.is_file() {
                deps.push(path.strip_prefix(workspace).unwrap_or(&path).to_path_buf());
            }
        }
    }

    deps.sort();
    deps.dedup();
    Ok(deps)
}
