//! core::rules
//!
//! Built-in and runtime rule tables, and the queries that decide whether a
//! package is managed by the tunnel policy.
//!
//! # Architecture
//!
//! A [`RuleSetManager`] owns two tiers of rules per [`Category`]:
//!
//! - **Built-in**: compiled in, parsed once at construction, never changes
//! - **Runtime**: replaced wholesale by [`RuleSetManager::configure_runtime_rules`]
//!
//! Queries combine both tiers: a package's rules are the built-in rules
//! followed by the runtime rules, OR-combined.
//!
//! # Concurrency
//!
//! The runtime tables for both categories live behind a single
//! `RwLock<Arc<_>>`. Reconfiguration builds the new tables off to the side
//! and then swaps the `Arc`; readers clone the `Arc` and work on that
//! snapshot. A reader therefore sees either the complete old tables or the
//! complete new ones, never a mix and never an empty intermediate state.
//! Published tables are never mutated.
//!
//! # Example
//!
//! ```
//! use tunnelrules::core::document::RuleDocument;
//! use tunnelrules::core::rules::RuleSetManager;
//! use tunnelrules::core::types::Category;
//!
//! let manager = RuleSetManager::new(&RuleDocument::new());
//! let doc = RuleDocument::new().with_rules(Category::Exclude, "pkg.b", ["[100-200]"]);
//! manager.configure_runtime_rules(&doc);
//!
//! assert!(manager.matches(Category::Exclude, "pkg.b", 150));
//! assert!(!manager.matches(Category::Exclude, "pkg.b", 250));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use super::document::{RawRules, RuleDocument};
use super::resolver::PackageVersionResolver;
use super::types::{Category, VersionCode};
use super::version_rule::{any_matches, parse_many, VersionRule};

/// Built-in exclusions. Each package must also be trusted by the host.
const BUILTIN_EXCLUDE: &[(&str, &[&str])] = &[
    ("ca.psiphon.conduit", &["*"]),
    ("network.ryve.app", &["*"]),
];

/// Built-in inclusions.
const BUILTIN_INCLUDE: &[(&str, &[&str])] = &[];

/// The built-in rules as a raw document.
pub fn builtin_document() -> RuleDocument {
    let mut doc = RuleDocument::new();
    for (category, entries) in [
        (Category::Exclude, BUILTIN_EXCLUDE),
        (Category::Include, BUILTIN_INCLUDE),
    ] {
        for (package, rules) in entries {
            doc = doc.with_rules(category, package, rules.iter().copied());
        }
    }
    doc
}

/// Parsed rules for one category: package identifier to non-empty rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    entries: BTreeMap<String, Vec<VersionRule>>,
}

impl RuleTable {
    /// Parse a raw category mapping.
    ///
    /// Invalid rule strings are dropped. Packages left with no valid rule
    /// are omitted entirely.
    pub fn from_raw(raw: &RawRules) -> Self {
        let entries = raw
            .iter()
            .filter_map(|(package, rule_strings)| {
                let rules = parse_many(rule_strings);
                if rules.is_empty() {
                    debug!(package = %package, "no valid rules, omitting package");
                    None
                } else {
                    Some((package.clone(), rules))
                }
            })
            .collect();
        Self { entries }
    }

    /// Rules for a package, if it has any.
    pub fn get(&self, package: &str) -> Option<&[VersionRule]> {
        self.entries.get(package).map(Vec::as_slice)
    }

    pub fn contains(&self, package: &str) -> bool {
        self.entries.contains_key(package)
    }

    /// Package identifiers in this table, sorted.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One [`RuleTable`] per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTables {
    exclude: RuleTable,
    include: RuleTable,
}

impl CategoryTables {
    /// Parse both categories of a raw document.
    pub fn from_document(doc: &RuleDocument) -> Self {
        Self {
            exclude: RuleTable::from_raw(&doc.exclude),
            include: RuleTable::from_raw(&doc.include),
        }
    }

    pub fn table(&self, category: Category) -> &RuleTable {
        match category {
            Category::Exclude => &self.exclude,
            Category::Include => &self.include,
        }
    }
}

/// Packages accepted by a reconfiguration, per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureSummary {
    /// Packages in the new exclude table.
    pub exclude: usize,
    /// Packages in the new include table.
    pub include: usize,
    /// Packages omitted because none of their rules parsed.
    pub omitted: usize,
}

/// Owner of the built-in and runtime rule tables.
#[derive(Debug)]
pub struct RuleSetManager {
    builtin: CategoryTables,
    runtime: RwLock<Arc<CategoryTables>>,
}

impl Default for RuleSetManager {
    /// A manager with the compiled-in built-in rules and no runtime rules.
    fn default() -> Self {
        Self::new(&builtin_document())
    }
}

impl RuleSetManager {
    /// Create a manager with the given built-in rules and no runtime rules.
    ///
    /// Built-in entries with no valid rule are dropped.
    pub fn new(builtin: &RuleDocument) -> Self {
        Self {
            builtin: CategoryTables::from_document(builtin),
            runtime: RwLock::new(Arc::new(CategoryTables::default())),
        }
    }

    /// Replace the runtime rules for both categories.
    ///
    /// Parsing happens before the swap; concurrent readers see either the
    /// previous tables or the new ones. Nothing is persisted here.
    pub fn configure_runtime_rules(&self, doc: &RuleDocument) -> ConfigureSummary {
        let tables = CategoryTables::from_document(doc);
        let summary = ConfigureSummary {
            exclude: tables.exclude.len(),
            include: tables.include.len(),
            omitted: doc.package_count(Category::Exclude) + doc.package_count(Category::Include)
                - tables.exclude.len()
                - tables.include.len(),
        };

        *self
            .runtime
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(tables);

        info!(
            exclude = summary.exclude,
            include = summary.include,
            omitted = summary.omitted,
            "loaded runtime rules"
        );
        summary
    }

    /// The runtime tables currently published.
    pub fn runtime_snapshot(&self) -> Arc<CategoryTables> {
        Arc::clone(
            &self
                .runtime
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// The built-in tables.
    pub fn builtin(&self) -> &CategoryTables {
        &self.builtin
    }

    /// Built-in rules for `package` followed by its runtime rules.
    pub fn rules_for_package(&self, category: Category, package: &str) -> Vec<VersionRule> {
        let runtime = self.runtime_snapshot();
        Self::combined_rules(&self.builtin, &runtime, category, package)
    }

    fn combined_rules(
        builtin: &CategoryTables,
        runtime: &CategoryTables,
        category: Category,
        package: &str,
    ) -> Vec<VersionRule> {
        let mut rules = Vec::new();
        if let Some(found) = builtin.table(category).get(package) {
            rules.extend_from_slice(found);
        }
        if let Some(found) = runtime.table(category).get(package) {
            rules.extend_from_slice(found);
        }
        rules
    }

    fn matches_in(
        &self,
        runtime: &CategoryTables,
        category: Category,
        package: &str,
        version_code: VersionCode,
    ) -> bool {
        [&self.builtin, runtime].into_iter().any(|tables| {
            tables
                .table(category)
                .get(package)
                .is_some_and(|rules| any_matches(rules, version_code))
        })
    }

    /// Does any rule for `package` in `category` match `version_code`?
    pub fn matches(&self, category: Category, package: &str, version_code: VersionCode) -> bool {
        let runtime = self.runtime_snapshot();
        self.matches_in(&runtime, category, package, version_code)
    }

    /// Does `package` match an exclude rule or an include rule?
    pub fn matches_any(&self, package: &str, version_code: VersionCode) -> bool {
        let runtime = self.runtime_snapshot();
        Category::ALL
            .into_iter()
            .any(|category| self.matches_in(&runtime, category, package, version_code))
    }

    /// Every package with built-in or runtime rules in `category`,
    /// regardless of whether it is installed or its version matches.
    pub fn all_managed_identifiers(&self, category: Category) -> BTreeSet<String> {
        let runtime = self.runtime_snapshot();
        Self::managed_in(&self.builtin, &runtime, category)
    }

    fn managed_in(
        builtin: &CategoryTables,
        runtime: &CategoryTables,
        category: Category,
    ) -> BTreeSet<String> {
        builtin
            .table(category)
            .packages()
            .chain(runtime.table(category).packages())
            .map(str::to_string)
            .collect()
    }

    /// Managed packages in `category` that are installed at a version
    /// matching their rules.
    pub fn version_aware_managed_identifiers(
        &self,
        category: Category,
        resolver: &dyn PackageVersionResolver,
    ) -> BTreeSet<String> {
        let runtime = self.runtime_snapshot();
        Self::managed_in(&self.builtin, &runtime, category)
            .into_iter()
            .filter(|package| match resolver.resolve(package) {
                Some(version_code) => self.matches_in(&runtime, category, package, version_code),
                None => false,
            })
            .collect()
    }
}
