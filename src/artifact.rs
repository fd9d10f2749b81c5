//! Build artifact descriptors and build results
//!
//! An artifact is one buildable image. Its `image` name is the identity
//! the cache keys on, so it must be unique within a build request.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Requested image name -> tag assigned for this build
pub type ImageTags = HashMap<String, String>;

/// One buildable image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Image name, also the cache identity
    pub image: String,

    /// Build context directory
    pub workspace: PathBuf,

    /// Builder-specific configuration
    pub kind: ArtifactType,
}

impl Artifact {
    /// Create a Dockerfile artifact with default settings
    pub fn docker(image: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            workspace: workspace.into(),
            kind: ArtifactType::Docker(DockerArtifact::default()),
        }
    }

    /// Create an artifact built by a shell command
    pub fn custom(
        image: impl Into<String>,
        workspace: impl Into<PathBuf>,
        command: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            image: image.into(),
            workspace: workspace.into(),
            kind: ArtifactType::Custom(CustomArtifact {
                command: command.into(),
                dependencies,
            }),
        }
    }
}

/// Builder-specific artifact configuration
///
/// Serialized with sorted maps so that the JSON form is canonical and can
/// be folded into the content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// Built from a Dockerfile by the container runtime
    Docker(DockerArtifact),
    /// Built by an arbitrary command that must produce `$IMAGE`
    Custom(CustomArtifact),
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker(_) => write!(f, "docker"),
            Self::Custom(_) => write!(f, "custom"),
        }
    }
}

/// Dockerfile build settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerArtifact {
    /// Dockerfile path relative to the workspace
    pub dockerfile: String,

    /// `--build-arg` values; `None` passes the arg through from the environment
    pub build_args: BTreeMap<String, Option<String>>,

    /// Target stage for multi-stage builds
    pub target: Option<String>,
}

impl Default for DockerArtifact {
    fn default() -> Self {
        Self {
            dockerfile: "Dockerfile".to_string(),
            build_args: BTreeMap::new(),
            target: None,
        }
    }
}

/// Custom command build settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomArtifact {
    /// Shell command run in the workspace
    pub command: String,

    /// Glob patterns (relative to the workspace) the build reads
    pub dependencies: Vec<String>,
}

/// A built (or reused) image for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// The requested image name
    pub image_name: String,
    /// Fully qualified tag, possibly pinned with `@digest`
    pub tag: String,
}

impl BuildResult {
    pub fn new(image_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            tag: tag.into(),
        }
    }
}
