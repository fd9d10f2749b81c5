//! Cache command - inspect or clear the artifact cache

use crate::cache::{CacheEntry, CacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{DockyardError, DockyardResult};
use crate::ui::{self, UiContext};
use console::style;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DockyardResult<()> {
    let cache_file = ConfigManager::cache_file(config);

    match args.action {
        CacheAction::List { format } => list_entries(&cache_file, format).await,
        CacheAction::Clear { images, yes } => clear_entries(&cache_file, &images, yes).await,
        CacheAction::Path => {
            println!("{}", cache_file.display());
            Ok(())
        }
    }
}

/// List cached artifacts
async fn list_entries(cache_file: &Path, format: OutputFormat) -> DockyardResult<()> {
    let store = CacheStore::load(cache_file).await;

    if store.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cached artifacts.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&store),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&store)?),
        OutputFormat::Plain => {
            for (image, _) in store.iter() {
                println!("{}", image);
            }
        }
    }

    Ok(())
}

fn print_table(store: &CacheStore) {
    println!(
        "{:<32} {:<40} {:<14} {:<16}",
        "IMAGE", "TAG", "DIGEST", "BUILT"
    );
    println!("{}", "-".repeat(104));

    for (image, entry) in store.iter() {
        println!(
            "{:<32} {:<40} {:<14} {:<16}",
            image,
            entry.tag,
            short_digest(entry),
            entry.built_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} artifact(s)", store.len());
}

/// First 12 hex characters of the digest, as runtimes display image IDs
fn short_digest(entry: &CacheEntry) -> String {
    match entry.digest.as_deref() {
        Some(digest) => {
            let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
            hex.chars().take(12).collect()
        }
        None => style("unknown").dim().to_string(),
    }
}

/// Forget some or all cached artifacts
///
/// Images themselves are left alone; the next build just cannot reuse them.
async fn clear_entries(cache_file: &Path, images: &[String], yes: bool) -> DockyardResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let mut store = CacheStore::load(cache_file).await;

    if store.is_empty() {
        println!("Cache is already empty.");
        return Ok(());
    }

    if let Some(unknown) = images.iter().find(|image| store.get(image).is_none()) {
        return Err(DockyardError::UnknownArtifact(unknown.clone()));
    }

    let targets: Vec<String> = if images.is_empty() {
        store.iter().map(|(image, _)| image.clone()).collect()
    } else {
        images.to_vec()
    };

    println!("This will forget {} cached artifact(s):", targets.len());
    for image in &targets {
        println!("  {} {}", style("•").red(), image);
    }
    println!();

    if !ui::confirm(&ctx, "Are you sure?", false)? {
        println!("Aborted.");
        return Ok(());
    }

    if targets.len() == store.len() {
        match fs::remove_file(cache_file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DockyardError::io(
                    format!("removing {}", cache_file.display()),
                    e,
                ))
            }
        }
        debug!("Removed cache file {}", cache_file.display());
    } else {
        for image in &targets {
            store.remove(image);
        }
        store.flush(cache_file).await?;
    }

    let noun = if targets.len() == 1 { "entry" } else { "entries" };
    ui::step_ok(&ctx, &format!("Cleared {} cache {}", targets.len(), noun));
    Ok(())
}
