//! Integration tests for Dockyard

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn dockyard() -> Command {
        cargo_bin_cmd!("dockyard")
    }

    /// Config file pointing the cache into `dir`
    fn isolated_config(dir: &Path, extra: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let content = format!(
            "[cache]\nfile = {:?}\n{}",
            dir.join("cache.json").display().to_string(),
            extra
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        dockyard()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("container image builds"));
    }

    #[test]
    fn version_displays() {
        dockyard()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dockyard"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("cache.json")));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["config", "set", "build.tag", "nightly"])
            .assert()
            .success();
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("nightly"));
    }

    #[test]
    fn config_set_unknown_key() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn cache_path_uses_config() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache.json"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached artifacts"));
    }

    #[test]
    fn cache_list_and_clear() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        std::fs::write(
            temp.path().join("cache.json"),
            r#"{"web": {"hash": "h1", "tag": "web:latest", "digest": "sha256:abcdef0123456789"}}"#,
        )
        .unwrap();

        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("web"));

        dockyard()
            .arg("-c")
            .arg(&config)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();
        assert!(!temp.path().join("cache.json").exists());
    }

    #[test]
    fn build_without_manifest_fails() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        dockyard()
            .current_dir(temp.path())
            .arg("-c")
            .arg(&config)
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Project manifest not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn build_unknown_artifact_fails() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "");
        std::fs::write(
            temp.path().join("dockyard.toml"),
            "[[artifacts]]\nimage = \"web\"\n",
        )
        .unwrap();
        dockyard()
            .current_dir(temp.path())
            .arg("-c")
            .arg(&config)
            .args(["build", "api"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown artifact: api"));
    }

    #[test]
    fn build_with_unsupported_runtime_fails() {
        let temp = TempDir::new().unwrap();
        let config = isolated_config(temp.path(), "[runtime]\nbinary = \"rkt\"\n");
        std::fs::write(
            temp.path().join("dockyard.toml"),
            "[[artifacts]]\nimage = \"web\"\n",
        )
        .unwrap();
        dockyard()
            .current_dir(temp.path())
            .arg("-c")
            .arg(&config)
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Container runtime not found: rkt"));
    }
}

mod cache_tests {
    use async_trait::async_trait;
    use dockyard::artifact::{Artifact, BuildResult, ImageTags};
    use dockyard::build::Builder;
    use dockyard::cache::{ArtifactCache, CacheStore};
    use dockyard::config::CacheConfig;
    use dockyard::deps::WorkspaceLister;
    use dockyard::digest::DigestSource;
    use dockyard::error::{DockyardError, DockyardResult};
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Image store shared by the fake builder and digest source
    #[derive(Default)]
    struct Registry {
        images: Mutex<HashMap<String, String>>,
        builds: Mutex<usize>,
    }

    struct RegistryDigests(Arc<Registry>);

    #[async_trait]
    impl DigestSource for RegistryDigests {
        async fn digest(&self, tag: &str) -> DockyardResult<String> {
            self.0
                .images
                .lock()
                .unwrap()
                .get(tag)
                .cloned()
                .ok_or_else(|| DockyardError::DigestNotFound(tag.to_string()))
        }

        fn result_tag(&self, tag: &str, digest: &str) -> String {
            format!("{}@{}", tag, digest)
        }

        fn name(&self) -> &'static str {
            "registry"
        }
    }

    struct PushingBuilder {
        registry: Arc<Registry>,
        built: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Builder for PushingBuilder {
        async fn build_and_test(
            &self,
            out: &mut (dyn Write + Send),
            tags: &ImageTags,
            artifacts: &[Artifact],
        ) -> DockyardResult<Vec<BuildResult>> {
            let mut results = Vec::new();
            for artifact in artifacts {
                let tag = &tags[&artifact.image];
                let n = {
                    let mut builds = self.registry.builds.lock().unwrap();
                    *builds += 1;
                    *builds
                };
                let digest = format!("sha256:{:064x}", n);
                writeln!(out, "pushed {}", tag).unwrap();
                self.registry
                    .images
                    .lock()
                    .unwrap()
                    .insert(tag.clone(), digest.clone());
                self.built.lock().unwrap().push(artifact.image.clone());
                results.push(BuildResult::new(
                    artifact.image.clone(),
                    format!("{}@{}", tag, digest),
                ));
            }
            Ok(results)
        }
    }

    fn write_context(dir: &Path, dockerfile: &str) {
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(dir.join("Dockerfile"), dockerfile).unwrap();
        std::fs::write(dir.join("src").join("main.txt"), "hello").unwrap();
        std::fs::write(dir.join(".dockerignore"), "*.log\n").unwrap();
    }

    #[tokio::test]
    async fn workspace_changes_drive_rebuilds() {
        let temp = TempDir::new().unwrap();
        let web = temp.path().join("web");
        let api = temp.path().join("api");
        write_context(&web, "FROM scratch\nCOPY src /src\n");
        write_context(&api, "FROM scratch\n");

        let artifacts = vec![
            Artifact::docker("registry.local/web", &web),
            Artifact::docker("registry.local/api", &api),
        ];
        let tags: ImageTags = artifacts
            .iter()
            .map(|a| (a.image.clone(), format!("{}:latest", a.image)))
            .collect();

        let registry = Arc::new(Registry::default());
        let cache_file = temp.path().join("cache.json");
        let cache = ArtifactCache::new(
            &CacheConfig {
                enabled: true,
                file: Some(cache_file.clone()),
            },
            Arc::new(RegistryDigests(registry.clone())),
            Arc::new(WorkspaceLister::new()),
        );
        let builder = || PushingBuilder {
            registry: registry.clone(),
            built: Mutex::new(Vec::new()),
        };

        let first = builder();
        cache
            .build(&mut std::io::sink(), &tags, &artifacts, &first)
            .await
            .unwrap();
        assert_eq!(first.built.lock().unwrap().len(), 2);

        // Ignored files do not invalidate
        std::fs::write(web.join("build.log"), "noise").unwrap();
        let second = builder();
        let results = cache
            .build(&mut std::io::sink(), &tags, &artifacts, &second)
            .await
            .unwrap();
        assert!(second.built.lock().unwrap().is_empty());
        assert!(results[0].tag.starts_with("registry.local/web:latest@sha256:"));

        // Source edits do
        std::fs::write(web.join("src").join("main.txt"), "hello, world").unwrap();
        let third = builder();
        let mut out = Vec::new();
        cache
            .build(&mut out, &tags, &artifacts, &third)
            .await
            .unwrap();
        assert_eq!(*third.built.lock().unwrap(), vec!["registry.local/web"]);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(" - registry.local/api: Found"));
        assert!(printed.contains(" - registry.local/web: Not found. Building"));

        let store = CacheStore::load(&cache_file).await;
        assert_eq!(store.len(), 2);
        let entry = store.get("registry.local/web").unwrap();
        assert_eq!(entry.tag, "registry.local/web:latest");
        assert!(entry.digest.is_some());
    }

    #[tokio::test]
    async fn corrupt_cache_file_forces_rebuild() {
        let temp = TempDir::new().unwrap();
        let web = temp.path().join("web");
        write_context(&web, "FROM scratch\n");
        let cache_file = temp.path().join("cache.json");
        std::fs::write(&cache_file, "{ definitely not json").unwrap();

        let artifacts = vec![Artifact::docker("web", &web)];
        let tags: ImageTags = [("web".to_string(), "web:latest".to_string())].into();
        let registry = Arc::new(Registry::default());
        let cache = ArtifactCache::new(
            &CacheConfig {
                enabled: true,
                file: Some(cache_file.clone()),
            },
            Arc::new(RegistryDigests(registry.clone())),
            Arc::new(WorkspaceLister::new()),
        );
        let builder = PushingBuilder {
            registry,
            built: Mutex::new(Vec::new()),
        };

        cache
            .build(&mut std::io::sink(), &tags, &artifacts, &builder)
            .await
            .unwrap();
        assert_eq!(builder.built.lock().unwrap().len(), 1);
        assert_eq!(CacheStore::load(&cache_file).await.len(), 1);
    }
}
