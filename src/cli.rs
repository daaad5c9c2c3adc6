//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stars static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long)]
    pub content: Option<PathBuf>,

    /// Config file name (default: stars.toml)
    #[arg(short = 'C', long, default_value = "stars.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Minify the html content
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Include posts marked as draft
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub drafts: Option<bool>,

    /// enable rss feed generation
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub rss: Option<bool>,

    /// enable sitemap generation
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub sitemap: Option<bool>,

    /// Override base URL for the site.
    ///
    /// Useful for CI deployments where the production URL differs from local development.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the whole site into the output directory
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Serve the site from memory, re-indexing posts on change
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Inspect and publish draft posts
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
}

/// `stars draft` subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DraftAction {
    /// List all draft posts
    List,

    /// Mark a draft as published by rewriting its front matter
    Publish {
        /// Slug of the draft post
        slug: String,
    },
}

#[allow(unused)]
impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
    pub const fn is_draft(&self) -> bool {
        matches!(self.command, Commands::Draft { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_args() {
        let cli = Cli::parse_from(["stars", "serve", "-p", "3000", "-w", "false"]);
        match cli.command {
            Commands::Serve { port, watch, .. } => {
                assert_eq!(port, Some(3000));
                assert_eq!(watch, Some(false));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_draft_publish() {
        let cli = Cli::parse_from(["stars", "draft", "publish", "hello-world"]);
        assert!(cli.is_draft());
        match cli.command {
            Commands::Draft {
                action: DraftAction::Publish { slug },
            } => assert_eq!(slug, "hello-world"),
            _ => panic!("expected draft publish"),
        }
    }

    #[test]
    fn test_default_config_name() {
        let cli = Cli::parse_from(["stars", "build"]);
        assert!(cli.is_build());
        assert_eq!(cli.config, PathBuf::from("stars.toml"));
    }
}
