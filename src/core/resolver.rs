//! core::resolver
//!
//! Package version lookup.
//!
//! The rule set manager never asks the host platform directly which
//! packages are installed. It goes through [`PackageVersionResolver`], so
//! the platform binding stays outside the core and tests can supply a
//! fixed inventory with [`StaticResolver`].

use std::collections::HashMap;

use super::types::VersionCode;

/// Answers "which version of this package is installed, if any?".
pub trait PackageVersionResolver {
    /// Returns the installed version code, or `None` if not installed.
    fn resolve(&self, package: &str) -> Option<VersionCode>;
}

impl<F> PackageVersionResolver for F
where
    F: Fn(&str) -> Option<VersionCode>,
{
    fn resolve(&self, package: &str) -> Option<VersionCode> {
        self(package)
    }
}

/// A fixed, in-memory package inventory.
///
/// # Example
///
/// ```
/// use tunnelrules::core::resolver::{PackageVersionResolver, StaticResolver};
///
/// let resolver = StaticResolver::new().with_package("pkg.a", 42);
/// assert_eq!(resolver.resolve("pkg.a"), Some(42));
/// assert_eq!(resolver.resolve("pkg.b"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticResolver {
    installed: HashMap<String, VersionCode>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of an installed package.
    pub fn with_package(mut self, package: &str, version_code: VersionCode) -> Self {
        self.insert(package, version_code);
        self
    }

    /// Register an installed package, replacing any previous version.
    pub fn insert(&mut self, package: &str, version_code: VersionCode) {
        self.installed.insert(package.to_string(), version_code);
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

impl PackageVersionResolver for StaticResolver {
    fn resolve(&self, package: &str) -> Option<VersionCode> {
        self.installed.get(package).copied()
    }
}

impl<S: Into<String>> FromIterator<(S, VersionCode)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (S, VersionCode)>>(iter: I) -> Self {
        Self {
            installed: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
