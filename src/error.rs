//! Error types for Dockyard
//!
//! All modules use `DockyardResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Dockyard operations
pub type DockyardResult<T> = Result<T, DockyardError>;

/// All errors that can occur in Dockyard
#[derive(Error, Debug)]
pub enum DockyardError {
    // Environment errors
    #[error("Container runtime not found: {0}. Install podman or docker")]
    RuntimeNotFound(String),

    #[error("Required CLI not found: {name}. {hint}")]
    CliNotFound { name: String, hint: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Project manifest not found (looked for dockyard.toml from {0})")]
    ProjectNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown artifact: {0}")]
    UnknownArtifact(String),

    #[error("Artifact listed more than once in a build request: {0}")]
    DuplicateArtifact(String),

    // Cache errors
    #[error("Could not resolve dependencies for {image}: {reason}")]
    DependencyResolution { image: String, reason: String },

    #[error("Failed to write cache file {path}: {source}")]
    CacheFlush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No digest found for {0}")]
    DigestNotFound(String),

    #[error("Registry lookup failed for {reference}: {reason}")]
    RegistryLookup { reference: String, reason: String },

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    // Build errors
    #[error("Image build failed: {tag}: {reason}")]
    ImageBuild { tag: String, reason: String },

    #[error("Image push failed: {tag}: {reason}")]
    ImagePush { tag: String, reason: String },

    #[error("Builder returned no result for {0}")]
    MissingBuildResult(String),

    #[error("No tag assigned to {0}")]
    MissingTag(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl DockyardError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the cache can absorb this error by forcing a rebuild
    pub fn is_cache_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DependencyResolution { .. }
                | Self::DigestNotFound(_)
                | Self::RegistryLookup { .. }
                | Self::InvalidReference(_)
                | Self::CacheFlush { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RuntimeNotFound(_) => Some("Set runtime.binary in the config to podman or docker"),
            Self::ProjectNotFound(_) => Some("Create a dockyard.toml with [[artifacts]] entries"),
            Self::CacheFlush { .. } => Some("Check cache.file in the config, or pass --cache-file"),
            Self::DuplicateArtifact(_) => Some("Each artifact image name must be unique"),
            _ => None,
        }
    }
}
