//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--store-dir <path>`: Override the rule store directory

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::policy::TunnelMode;
use crate::core::types::{Category, VersionCode};

/// tunrules - manage split-tunnel app rules
#[derive(Parser, Debug)]
#[command(name = "tunrules")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory holding the rule store (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse rule strings and print their canonical form
    #[command(
        name = "validate",
        after_help = "\
EXAMPLES:
    tunrules validate '*' '[100-200]' '>=300' 150"
    )]
    Validate {
        /// Rule strings to check
        #[arg(required = true)]
        rules: Vec<String>,
    },

    /// Apply a JSON rule document and persist it
    #[command(
        name = "import",
        long_about = "Apply a JSON rule document and persist it.\n\n\
            The document has two objects, \"exclude\" and \"include\", each mapping \
            package identifiers to arrays of rule strings. Invalid rule strings are \
            dropped when the rules are applied; the document is stored as given."
    )]
    Import {
        /// Path to the JSON document
        file: PathBuf,
    },

    /// Print the persisted rule document
    Show,

    /// Check a package version against the persisted rules
    Check {
        /// Package identifier
        package: String,

        /// Installed version code
        #[arg(allow_negative_numbers = true)]
        version: VersionCode,
    },

    /// List packages managed by the rules
    Managed {
        /// Restrict to one category
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,

        /// Installed package as PACKAGE=VERSION; enables version-aware filtering
        #[arg(long = "installed", value_name = "PACKAGE=VERSION", value_parser = parse_installed)]
        installed: Vec<(String, VersionCode)>,
    },

    /// Decide whether a package's traffic goes through the tunnel
    Tunneled {
        /// Package identifier
        package: String,

        /// Tunnel mode (defaults to the configured mode)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<TunnelMode>,

        /// Selected app; repeat for each
        #[arg(long = "app", value_name = "PACKAGE")]
        apps: Vec<String>,
    },

    /// Print the part of an app selection not managed by rules
    Controllable {
        /// Selected app; repeat for each
        #[arg(long = "app", value_name = "PACKAGE")]
        apps: Vec<String>,

        /// Installed package as PACKAGE=VERSION
        #[arg(long = "installed", value_name = "PACKAGE=VERSION", value_parser = parse_installed)]
        installed: Vec<(String, VersionCode)>,

        /// The host application's own package, never left in a selection
        #[arg(long, value_name = "PACKAGE")]
        self_package: Option<String>,
    },
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse().map_err(|e: crate::core::types::TypeError| e.to_string())
}

fn parse_mode(s: &str) -> Result<TunnelMode, String> {
    s.parse()
        .map_err(|e: crate::core::policy::InvalidTunnelMode| e.to_string())
}

/// Parse `PACKAGE=VERSION`.
pub fn parse_installed(s: &str) -> Result<(String, VersionCode), String> {
    let (package, version) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PACKAGE=VERSION, got '{}'", s))?;
    let package = package.trim();
    if package.is_empty() {
        return Err(format!("missing package in '{}'", s));
    }
    let version = version
        .trim()
        .parse::<VersionCode>()
        .map_err(|e| format!("invalid version in '{}': {}", s, e))?;
    Ok((package.to_string(), version))
}
