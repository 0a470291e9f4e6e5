//! core::policy
//!
//! Per-app tunnel routing decisions and the user-selection helpers that
//! sit on top of the rule set manager.
//!
//! # Modes
//!
//! - [`TunnelMode::AllApps`]: every app goes through the tunnel
//! - [`TunnelMode::ExcludeApps`]: every app except the selected ones
//! - [`TunnelMode::IncludeApps`]: only the selected apps
//!
//! A [`TunnelPolicy`] pairs a mode with the app selection that was active
//! when the tunnel started. When no tunnel is running, use
//! [`TunnelPolicy::default`], which tunnels everything.
//!
//! # Managed apps
//!
//! Apps matched by an exclude or include rule are managed by the rule set,
//! not by the user. [`user_controllable_apps`] strips them (and anything not
//! installed) from a stored user selection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::resolver::PackageVersionResolver;
use super::rules::RuleSetManager;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid tunnel mode '{0}', must be one of: all, include, exclude")]
pub struct InvalidTunnelMode(String);

/// Which apps are routed through the tunnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TunnelMode {
    #[default]
    #[serde(rename = "all")]
    AllApps,
    #[serde(rename = "include")]
    IncludeApps,
    #[serde(rename = "exclude")]
    ExcludeApps,
}

impl TunnelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelMode::AllApps => "all",
            TunnelMode::IncludeApps => "include",
            TunnelMode::ExcludeApps => "exclude",
        }
    }
}

impl fmt::Display for TunnelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TunnelMode {
    type Err = InvalidTunnelMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TunnelMode::AllApps),
            "include" => Ok(TunnelMode::IncludeApps),
            "exclude" => Ok(TunnelMode::ExcludeApps),
            _ => Err(InvalidTunnelMode(s.to_string())),
        }
    }
}

/// A tunnel mode plus the app selection it applies to.
///
/// # Example
///
/// ```
/// use tunnelrules::core::policy::{TunnelMode, TunnelPolicy};
///
/// let policy = TunnelPolicy::new(TunnelMode::IncludeApps, Some(["org.browser"]));
/// assert!(policy.is_app_tunneled("org.browser"));
/// assert!(!policy.is_app_tunneled("org.other"));
///
/// assert!(TunnelPolicy::default().is_app_tunneled("org.other"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelPolicy {
    mode: TunnelMode,
    apps: Option<BTreeSet<String>>,
}

impl TunnelPolicy {
    /// Create a policy. `None` means no selection was recorded.
    pub fn new<I, S>(mode: TunnelMode, apps: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            apps: apps.map(|apps| apps.into_iter().map(Into::into).collect()),
        }
    }

    pub fn mode(&self) -> TunnelMode {
        self.mode
    }

    /// Is traffic from `package` routed through the tunnel?
    ///
    /// In exclude mode a missing selection excludes nothing; in include
    /// mode a missing selection includes nothing.
    pub fn is_app_tunneled(&self, package: &str) -> bool {
        let selected = self.apps.as_ref().map(|apps| apps.contains(package));
        match self.mode {
            TunnelMode::AllApps => true,
            TunnelMode::ExcludeApps => selected != Some(true),
            TunnelMode::IncludeApps => selected == Some(true),
        }
    }
}

/// The part of a user's app selection the user may still change.
///
/// Drops packages that are not installed and packages whose installed
/// version matches any exclude or include rule.
pub fn user_controllable_apps(
    selection: &BTreeSet<String>,
    manager: &RuleSetManager,
    resolver: &dyn PackageVersionResolver,
) -> BTreeSet<String> {
    selection
        .iter()
        .filter(|package| match resolver.resolve(package) {
            Some(version_code) => !manager.matches_any(package, version_code),
            None => false,
        })
        .cloned()
        .collect()
}

/// Remove the host application's own package from an exclusion selection.
pub fn sanitize_exclusions(selection: &BTreeSet<String>, self_package: &str) -> BTreeSet<String> {
    selection
        .iter()
        .filter(|package| package.as_str() != self_package)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::RuleDocument;
    use crate::core::resolver::StaticResolver;
    use crate::core::types::Category;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn all_apps_tunnels_everything() {
        let policy = TunnelPolicy::new(TunnelMode::AllApps, Some(["a"]));
        assert!(policy.is_app_tunneled("a"));
        assert!(policy.is_app_tunneled("b"));
    }

    #[test]
    fn exclude_mode() {
        let policy = TunnelPolicy::new(TunnelMode::ExcludeApps, Some(["a"]));
        assert!(!policy.is_app_tunneled("a"));
        assert!(policy.is_app_tunneled("b"));

        let no_selection = TunnelPolicy::new(TunnelMode::ExcludeApps, None::<Vec<String>>);
        assert!(no_selection.is_app_tunneled("a"));
    }

    #[test]
    fn include_mode() {
        let policy = TunnelPolicy::new(TunnelMode::IncludeApps, Some(vec!["a".to_string()]));
        assert!(policy.is_app_tunneled("a"));
        assert!(!policy.is_app_tunneled("b"));

        let no_selection = TunnelPolicy::new(TunnelMode::IncludeApps, None::<Vec<String>>);
        assert!(!no_selection.is_app_tunneled("a"));
    }

    #[test]
    fn default_policy_is_all_apps() {
        assert_eq!(TunnelPolicy::default().mode(), TunnelMode::AllApps);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("all".parse::<TunnelMode>(), Ok(TunnelMode::AllApps));
        assert_eq!("Include".parse::<TunnelMode>(), Ok(TunnelMode::IncludeApps));
        assert_eq!("exclude".parse::<TunnelMode>(), Ok(TunnelMode::ExcludeApps));
        assert!("split".parse::<TunnelMode>().is_err());
        assert_eq!(TunnelMode::ExcludeApps.to_string(), "exclude");
    }

    #[test]
    fn mode_serde_uses_short_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: TunnelMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"include\"").unwrap();
        assert_eq!(parsed.mode, TunnelMode::IncludeApps);
    }

    #[test]
    fn controllable_apps_drop_managed_and_uninstalled() {
        let manager = RuleSetManager::new(&RuleDocument::new());
        manager.configure_runtime_rules(
            &RuleDocument::new()
                .with_rules(Category::Exclude, "managed.old", ["<100"])
                .with_rules(Category::Include, "managed.any", ["*"]),
        );
        let resolver = StaticResolver::new()
            .with_package("managed.old", 150)
            .with_package("managed.any", 1)
            .with_package("free", 3);

        let selection = set(&["managed.old", "managed.any", "free", "not.installed"]);
        assert_eq!(
            user_controllable_apps(&selection, &manager, &resolver),
            set(&["managed.old", "free"])
        );
    }

    #[test]
    fn sanitize_removes_self() {
        let selection = set(&["me", "other"]);
        assert_eq!(sanitize_exclusions(&selection, "me"), set(&["other"]));
        assert_eq!(sanitize_exclusions(&selection, "absent"), selection);
    }
}
