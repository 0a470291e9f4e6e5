//! validate command - Parse rule strings and print their canonical form

use anyhow::{bail, Result};

use crate::core::version_rule::VersionRule;

/// Print each rule's canonical form, or why it is invalid.
///
/// Fails if any rule is invalid, after reporting all of them.
pub fn validate(rules: &[String]) -> Result<()> {
    let mut invalid = 0;
    for raw in rules {
        match VersionRule::parse(raw) {
            Ok(rule) => println!("ok       {:<16} {}", raw, rule),
            Err(e) => {
                invalid += 1;
                println!("invalid  {:<16} {}", raw, e);
            }
        }
    }

    if invalid > 0 {
        bail!("{} of {} rules are invalid", invalid, rules.len());
    }
    Ok(())
}
