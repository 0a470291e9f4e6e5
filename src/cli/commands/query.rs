//! check and managed commands - Query the combined rule tables

use anyhow::Result;

use super::{resolver_from, Context};
use crate::core::types::{Category, VersionCode};

/// Report how a package version matches each category.
pub fn check(ctx: &Context, package: &str, version: VersionCode) -> Result<()> {
    let manager = ctx.manager();

    for category in Category::ALL {
        let rules = manager.rules_for_package(category, package);
        let rendered: Vec<String> = rules.iter().map(ToString::to_string).collect();
        println!(
            "{:<8} {:<5} [{}]",
            category,
            manager.matches(category, package, version),
            rendered.join(", ")
        );
    }
    println!("{:<8} {}", "any", manager.matches_any(package, version));
    Ok(())
}

/// List managed packages, optionally filtered by installed version.
pub fn managed(
    ctx: &Context,
    category: Option<Category>,
    installed: &[(String, VersionCode)],
) -> Result<()> {
    let manager = ctx.manager();
    let categories: Vec<Category> = match category {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };

    for category in categories {
        let packages = if installed.is_empty() {
            manager.all_managed_identifiers(category)
        } else {
            manager.version_aware_managed_identifiers(category, &resolver_from(installed))
        };
        for package in packages {
            println!("{}\t{}", category, package);
        }
    }
    Ok(())
}
