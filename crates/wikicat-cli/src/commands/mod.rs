pub mod rules;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use wikicat_engine::WikicatConfig;

/// Rule file used when `--rules` is not given
pub const DEFAULT_RULES: &str = ".wikicat/template_rules.json";

/// Project selection shared by every command
#[derive(Debug, clap::Args)]
pub struct ProjectArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Project family (overrides the config file)
    #[arg(long)]
    pub family: Option<String>,

    /// Project language (overrides the config file)
    #[arg(long)]
    pub lang: Option<String>,
}

impl ProjectArgs {
    pub fn load(&self) -> Result<WikicatConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(family) = &self.family {
            config.migration.family = family.clone();
        }
        if let Some(lang) = &self.lang {
            config.migration.lang = lang.clone();
        }
        Ok(config)
    }
}

fn load_config(path: Option<&Path>) -> Result<WikicatConfig> {
    match path {
        Some(path) => WikicatConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(WikicatConfig::default()),
    }
}
