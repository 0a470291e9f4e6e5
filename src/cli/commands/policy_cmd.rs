//! tunneled and controllable commands - Per-app routing decisions

use std::collections::BTreeSet;

use anyhow::Result;

use super::{resolver_from, Context};
use crate::core::policy::{sanitize_exclusions, user_controllable_apps, TunnelMode, TunnelPolicy};
use crate::core::types::VersionCode;

/// Print whether `package` is tunneled under the mode and selection.
pub fn tunneled(
    ctx: &Context,
    package: &str,
    mode: Option<TunnelMode>,
    apps: &[String],
) -> Result<()> {
    let mode = mode.unwrap_or(ctx.tunnel_mode);
    let selection = (!apps.is_empty()).then_some(apps);
    let policy = TunnelPolicy::new(mode, selection.map(|apps| apps.iter().cloned()));

    println!("{}", policy.is_app_tunneled(package));
    Ok(())
}

/// Print the selected apps the user may still toggle.
pub fn controllable(
    ctx: &Context,
    apps: &[String],
    installed: &[(String, VersionCode)],
    self_package: Option<&str>,
) -> Result<()> {
    let mut selection: BTreeSet<String> = apps.iter().cloned().collect();
    if let Some(self_package) = self_package {
        selection = sanitize_exclusions(&selection, self_package);
    }

    let manager = ctx.manager();
    for package in user_controllable_apps(&selection, &manager, &resolver_from(installed)) {
        println!("{}", package);
    }
    Ok(())
}
