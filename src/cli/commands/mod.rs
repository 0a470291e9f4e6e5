//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls into the core (store, rule set manager, policy)
//! 3. Formats and displays output
//!
//! Handlers that query rules load the persisted document and apply it to a
//! fresh [`RuleSetManager`] first, the same way a long-running host would at
//! startup.

mod policy_cmd;
mod query;
mod store_cmd;
mod validate;

// Re-export command functions for testing and direct invocation
pub use policy_cmd::{controllable, tunneled};
pub use query::{check, managed};
pub use store_cmd::{import, show};
pub use validate::validate;

use anyhow::Result;

use super::args::Command;
use crate::core::document::{rule_store, RuleDocument};
use crate::core::policy::TunnelMode;
use crate::core::resolver::StaticResolver;
use crate::core::rules::RuleSetManager;
use crate::core::store::{LockedStore, StorePaths};
use crate::core::types::VersionCode;

/// Settings resolved from config and global flags.
#[derive(Debug, Clone)]
pub struct Context {
    /// Rule store location
    pub paths: StorePaths,
    /// Default tunnel mode
    pub tunnel_mode: TunnelMode,
}

impl Context {
    /// The rule document store.
    pub fn store(&self) -> LockedStore<RuleDocument> {
        rule_store(self.paths.clone())
    }

    /// A manager with the built-in rules plus the persisted runtime rules.
    pub fn manager(&self) -> RuleSetManager {
        let manager = RuleSetManager::default();
        manager.configure_runtime_rules(&self.store().load());
        manager
    }
}

/// Build a resolver from `--installed` pairs.
fn resolver_from(installed: &[(String, VersionCode)]) -> StaticResolver {
    installed
        .iter()
        .map(|(package, version)| (package.as_str(), *version))
        .collect()
}

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Validate { rules } => validate::validate(&rules),
        Command::Import { file } => store_cmd::import(ctx, &file),
        Command::Show => store_cmd::show(ctx),
        Command::Check { package, version } => query::check(ctx, &package, version),
        Command::Managed {
            category,
            installed,
        } => query::managed(ctx, category, &installed),
        Command::Tunneled {
            package,
            mode,
            apps,
        } => policy_cmd::tunneled(ctx, &package, mode, &apps),
        Command::Controllable {
            apps,
            installed,
            self_package,
        } => policy_cmd::controllable(ctx, &apps, &installed, self_package.as_deref()),
    }
}
