//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{DockyardError, DockyardResult};
use crate::orchestration::RuntimeKind;
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "runtime.binary",
    "cache.enabled",
    "cache.file",
    "build.push",
    "build.tag",
    "build.insecure_registries",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> DockyardResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> DockyardResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> DockyardResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> DockyardResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();

    if let Err(e) = apply_setting(&mut config, key, value) {
        ui::step_error_detail(&ctx, "Cannot set config value", &e.to_string());
        ui::remark("Valid keys:");
        for key in VALID_KEYS {
            ui::remark(key);
        }
        return Err(e);
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

/// Set one dot-separated key on `config`
fn apply_setting(config: &mut Config, key: &str, value: &str) -> DockyardResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(DockyardError::User(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },

        ["runtime", "binary"] => {
            if RuntimeKind::from_binary(value).is_none() {
                return Err(DockyardError::User(format!(
                    "Unsupported runtime: {}. Use podman or docker",
                    value
                )));
            }
            config.runtime.binary = value.to_string();
        }

        ["cache", "enabled"] => config.cache.enabled = parse_bool(value)?,
        ["cache", "file"] => {
            config.cache.file = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        }

        ["build", "push"] => config.build.push = parse_bool(value)?,
        ["build", "tag"] => config.build.tag = value.to_string(),
        ["build", "insecure_registries"] => {
            config.build.insecure_registries = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        _ => return Err(DockyardError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

fn parse_bool(value: &str) -> DockyardResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(DockyardError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}
