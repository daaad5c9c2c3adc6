//! Site configuration management for `stars.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                      |
//! |--------------|----------------------------------------------|
//! | `[base]`     | Site metadata (title, author, url)           |
//! | `[build]`    | Paths, minify, drafts, RSS, sitemap          |
//! | `[serve]`    | Preview server (port, interface, watch)      |
//! | `[[series]]` | Declared series with description and order   |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "My Blog"
//! description = "A personal blog"
//! url = "https://example.com"
//!
//! [build]
//! content = "content"
//! output = "public"
//!
//! [build.rss]
//! enable = true
//!
//! [[series]]
//! name = "Rust Basics"
//! description = "Ownership from the ground up"
//! order = 1
//! ```

mod base;
mod build;
pub mod defaults;
mod error;
mod serve;

pub use error::ConfigError;

use base::BaseConfig;
use build::BuildConfig;
use serve::ServeConfig;

use crate::cli::{BuildArgs, Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing stars.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Declared series
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

/// `[[series]]` entry.
///
/// A declared series gets a listing page even before any post joins it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Display rank among declared series (ascending).
    #[serde(default)]
    pub order: i64,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Base URL without trailing slashes, empty when unset.
    pub fn base_url(&self) -> &str {
        self.base
            .url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or_default()
    }

    /// Declared series sorted by `order`, then name.
    pub fn declared_series(&self) -> Vec<&SeriesConfig> {
        let mut series: Vec<_> = self.series.iter().collect();
        series.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        series
    }

    /// Look up a declared series by name.
    pub fn series_info(&self, name: &str) -> Option<&SeriesConfig> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .as_ref()
            .cloned()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        self.update_path_with_root(&root, &cli.config);

        match &cli.command {
            Commands::Build { build_args } => self.update_build_args(build_args),
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
            } => {
                self.update_build_args(build_args);
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
                self.base.url = Some(format!(
                    "http://{}:{}",
                    self.serve.interface, self.serve.port
                ));
            }
            Commands::Draft { .. } => {}
        }
    }

    fn update_build_args(&mut self, args: &BuildArgs) {
        self.build.clean |= args.clean;
        Self::update_option(&mut self.build.minify, args.minify.as_ref());
        Self::update_option(&mut self.build.drafts, args.drafts.as_ref());
        Self::update_option(&mut self.build.rss.enable, args.rss.as_ref());
        Self::update_option(&mut self.build.sitemap.enable, args.sitemap.as_ref());
        if let Some(url) = &args.base_url {
            self.base.url = Some(url.clone());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, config: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config));
        self.build.content = Self::normalize_path(&root.join(&self.build.content));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.static_dir = Self::normalize_path(&root.join(&self.build.static_dir));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base.url
            && !base_url.starts_with("http")
        {
            bail!(ConfigError::Validation(
                "[base.url] must start with http:// or https://".into()
            ));
        }

        if self.build.rss.enable && self.base.url.is_none() {
            bail!(ConfigError::Validation(
                "[base.url] is required for RSS generation".into()
            ));
        }

        if self.serve.workers == 0 {
            bail!(ConfigError::Validation(
                "[serve.workers] must be at least 1".into()
            ));
        }

        if let Some(series) = self.series.iter().find(|s| s.name.trim().is_empty()) {
            bail!(ConfigError::Validation(format!(
                "[[series]] entry with order {} has an empty name",
                series.order
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
