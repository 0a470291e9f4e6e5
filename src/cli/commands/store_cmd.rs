//! import and show commands - Persist and print the rule document

use std::fs;
use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::Context;
use crate::core::document::RuleDocument;
use crate::core::rules::RuleSetManager;

/// Apply a JSON rule document and persist it.
pub fn import(ctx: &Context, file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let doc = RuleDocument::from_json(&bytes)
        .with_context(|| format!("Invalid rule document {}", file.display()))?;

    let summary = RuleSetManager::default().configure_runtime_rules(&doc);

    ctx.store()
        .try_save(&doc)
        .with_context(|| format!("Failed to save rules to {}", ctx.paths.target.display()))?;

    println!(
        "Imported {} exclude and {} include packages",
        summary.exclude, summary.include
    );
    if summary.omitted > 0 {
        println!(
            "{} packages had no valid rules and are ignored",
            summary.omitted
        );
    }
    Ok(())
}

/// Print the persisted rule document as pretty JSON.
pub fn show(ctx: &Context) -> Result<()> {
    let store = ctx.store();
    let doc = match store.try_load() {
        Ok(Some(doc)) => doc,
        Ok(None) => store.default_value(),
        Err(e) if e.is_lock_contention() => bail!("Rule store is busy: {}", e),
        Err(e) => {
            eprintln!("warning: {}; showing empty rules", e);
            store.default_value()
        }
    };

    let json = serde_json::to_string_pretty(&doc).context("Failed to format rules")?;
    println!("{}", json);
    Ok(())
}
