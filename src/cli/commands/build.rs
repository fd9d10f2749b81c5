//! Build command - build project artifacts through the cache

use crate::artifact::{Artifact, ImageTags};
use crate::build::RuntimeBuilder;
use crate::cache::ArtifactCache;
use crate::cli::args::BuildArgs;
use crate::config::{BuildConfig, CacheConfig, Config, Project};
use crate::deps::WorkspaceLister;
use crate::digest::create_digest_source;
use crate::error::{DockyardError, DockyardResult};
use crate::orchestration::create_runtime;
use crate::ui::{self, BuildOutput, UiContext};
use std::env;
use std::sync::Arc;
use tracing::{debug, info};

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> DockyardResult<()> {
    let ctx = UiContext::detect();

    let start = match args.project {
        Some(ref dir) if !dir.is_dir() => return Err(DockyardError::PathNotFound(dir.clone())),
        Some(ref dir) => dir.clone(),
        None => env::current_dir().map_err(|e| DockyardError::io("getting current directory", e))?,
    };
    let project = Project::discover(&start).await?;
    let artifacts = project.artifacts(&args.images)?;

    if artifacts.is_empty() {
        ui::step_warn_hint(
            &ctx,
            "Nothing to build",
            "Add [[artifacts]] entries to dockyard.toml",
        );
        return Ok(());
    }

    let settings = build_settings(&args, config, &project);
    let cache_config = cache_settings(&args, &config.cache);
    let tags = image_tags(&artifacts, &settings.tag);

    let runtime = create_runtime(config)?;
    if !runtime.is_available().await? {
        return Err(DockyardError::CliNotFound {
            name: config.runtime.binary.clone(),
            hint: format!("{} must be installed and on PATH", runtime.runtime_name()),
        });
    }
    debug!(
        "Building {} artifact(s) with {} (push: {}, cache: {})",
        artifacts.len(),
        runtime.runtime_name(),
        settings.push,
        cache_config.enabled
    );

    // Pushed images are confirmed against their registry, local ones
    // against the runtime's image store
    let digest_source = create_digest_source(
        !settings.push,
        runtime.clone(),
        &settings.insecure_registries,
    );
    let cache = ArtifactCache::new(&cache_config, digest_source, Arc::new(WorkspaceLister::new()));
    let builder = RuntimeBuilder::new(runtime, settings.push);

    // Ctrl-C drops the build future: pending lookups and builds stop and
    // the cache file is left as it was
    let mut out = BuildOutput::new(&ctx);
    let results = tokio::select! {
        results = cache.build(&mut out, &tags, &artifacts, &builder) => results,
        _ = tokio::signal::ctrl_c() => Err(DockyardError::User("Build interrupted".to_string())),
    };
    out.finish();
    let results = results?;

    for result in &results {
        ui::artifact_result(&ctx, &result.image_name, &result.tag);
    }
    info!(
        "Built {} artifact(s), cache file {}",
        results.len(),
        cache.cache_file().display()
    );

    Ok(())
}

/// Global build config, then the manifest's `[build]`, then flags
fn build_settings(args: &BuildArgs, config: &Config, project: &Project) -> BuildConfig {
    let mut settings = config.build.clone();
    project.build.apply(&mut settings);

    if args.push {
        settings.push = true;
    }
    if let Some(ref tag) = args.tag {
        settings.tag = tag.clone();
    }
    for registry in &args.insecure_registries {
        if !settings.insecure_registries.contains(registry) {
            settings.insecure_registries.push(registry.clone());
        }
    }
    settings
}

fn cache_settings(args: &BuildArgs, cache: &CacheConfig) -> CacheConfig {
    let mut cache = cache.clone();
    if args.no_cache {
        cache.enabled = false;
    }
    if let Some(ref path) = args.cache_file {
        cache.file = Some(path.clone());
    }
    cache
}

/// Tag every artifact as `image:tag`
fn image_tags(artifacts: &[Artifact], tag: &str) -> ImageTags {
    artifacts
        .iter()
        .map(|artifact| {
            (
                artifact.image.clone(),
                format!("{}:{}", artifact.image, tag),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;
    use std::path::PathBuf;

    fn build_args(argv: &[&str]) -> BuildArgs {
        let mut full = vec!["dockyard", "build"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Build(args) => args,
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.build.insecure_registries = vec!["registry.lan".to_string()];
        let args = build_args(&[
            "--push",
            "--tag",
            "v2",
            "--insecure-registry",
            "registry.lan",
            "--insecure-registry",
            "localhost:5000",
        ]);

        let settings = build_settings(&args, &config, &Project::default());
        assert!(settings.push);
        assert_eq!(settings.tag, "v2");
        assert_eq!(
            settings.insecure_registries,
            vec!["registry.lan", "localhost:5000"]
        );
    }

    #[test]
    fn defaults_come_from_config() {
        let settings = build_settings(&build_args(&[]), &Config::default(), &Project::default());
        assert!(!settings.push);
        assert_eq!(settings.tag, "latest");
    }

    #[test]
    fn no_cache_and_cache_file_flags() {
        let args = build_args(&["--no-cache", "--cache-file", "/tmp/c.json"]);
        let cache = cache_settings(&args, &CacheConfig::default());
        assert!(!cache.enabled);
        assert_eq!(cache.file, Some(PathBuf::from("/tmp/c.json")));
    }

    #[test]
    fn tags_use_image_name() {
        let artifacts = vec![
            Artifact::docker("registry.local/web", "/src/web"),
            Artifact::docker("worker", "/src/worker"),
        ];
        let tags = image_tags(&artifacts, "dev");
        assert_eq!(tags["registry.local/web"], "registry.local/web:dev");
        assert_eq!(tags["worker"], "worker:dev");
    }
}
