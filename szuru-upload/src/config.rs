use std::path::PathBuf;

use anyhow::Context;
use szuru_core::{DryRun, Safety};

/// Already-validated command-line values, merged with the environment by
/// [`UploadConfig::resolve`].
#[derive(Clone, Debug, Default)]
pub struct CliOptions {
    pub sources: Vec<PathBuf>,
    pub tags: Vec<String>,
    pub safe: bool,
    pub remove: bool,
    pub dry_run: bool,
}

/// Immutable per-run configuration. Resolution fails fast when the remote
/// session would be unusable, before any item is attempted.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub address: String,
    pub api_token: String,
    pub offline: bool,
    pub sources: Vec<PathBuf>,
    pub tags: Vec<String>,
    pub safety: Safety,
    pub remove_source: bool,
    pub failsafe_dir: PathBuf,
    pub dry_run: DryRun,
}

impl UploadConfig {
    pub fn resolve(options: CliOptions) -> anyhow::Result<Self> {
        let address =
            std::env::var("SZURU_ADDRESS").context("SZURU_ADDRESS is not set")?;
        let api_token =
            std::env::var("SZURU_API_TOKEN").context("SZURU_API_TOKEN is not set")?;
        anyhow::ensure!(!address.trim().is_empty(), "SZURU_ADDRESS is empty");
        anyhow::ensure!(!api_token.trim().is_empty(), "SZURU_API_TOKEN is empty");

        let offline = read_bool_env("SZURU_OFFLINE", false);
        let failsafe_dir = match std::env::var("SZURU_FAILSAFE_DIR") {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => default_failsafe_dir()?,
        };
        let sources = if options.sources.is_empty() {
            vec![std::env::current_dir().context("current directory is unavailable")?]
        } else {
            options.sources
        };

        Ok(Self {
            address,
            api_token,
            offline,
            sources,
            tags: options.tags,
            safety: if options.safe { Safety::Safe } else { Safety::Unsafe },
            remove_source: options.remove,
            failsafe_dir,
            dry_run: DryRun::new(options.dry_run),
        })
    }

    /// Logs the resolved configuration, with the token redacted.
    pub fn describe(&self) {
        tracing::info!(
            address = %self.address,
            offline = self.offline,
            sources = ?self.sources,
            tags = ?self.tags,
            safety = %self.safety,
            remove_source = self.remove_source,
            failsafe_dir = %self.failsafe_dir.display(),
            dry_run = self.dry_run.is_active(),
            "resolved configuration"
        );
    }
}

fn default_failsafe_dir() -> anyhow::Result<PathBuf> {
    let data = dirs::data_dir().context("data directory is unavailable")?;
    Ok(data.join("szuru-upload").join("failsafe"))
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|value| parse_bool(&value))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
