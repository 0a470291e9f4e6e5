//! core::document
//!
//! The raw, pre-parse rule document. This is the value persisted by the
//! rule store and handed to the rule set manager on reconfiguration.
//!
//! # Format
//!
//! ```json
//! {
//!   "exclude": { "com.example.app": ["*"] },
//!   "include": { "com.other.app": ["[100-200]", ">=300"] }
//! }
//! ```
//!
//! Decoding is lenient where the rule source is known to be sloppy:
//!
//! - the top level must be an object; anything else is a decode failure
//! - a missing, `null` or non-object `exclude`/`include` is an empty mapping
//! - unknown top-level keys are ignored
//! - each package must map to an array; numeric and boolean elements are
//!   kept as their text (`[100]` reads as `["100"]`)

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::store::{CodecError, LockedStore, StorePaths};
use super::types::Category;

/// Package identifier to its raw rule strings, for one category.
pub type RawRules = BTreeMap<String, Vec<String>>;

/// Raw rule strings for both categories, exactly as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDocument {
    pub exclude: RawRules,
    pub include: RawRules,
}

impl RuleDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw rules for a category.
    pub fn category(&self, category: Category) -> &RawRules {
        match category {
            Category::Exclude => &self.exclude,
            Category::Include => &self.include,
        }
    }

    /// Get the raw rules for a category, mutably.
    pub fn category_mut(&mut self, category: Category) -> &mut RawRules {
        match category {
            Category::Exclude => &mut self.exclude,
            Category::Include => &mut self.include,
        }
    }

    /// Builder-style insertion of one package's rule strings.
    ///
    /// # Example
    ///
    /// ```
    /// use tunnelrules::core::document::RuleDocument;
    /// use tunnelrules::core::types::Category;
    ///
    /// let doc = RuleDocument::new()
    ///     .with_rules(Category::Exclude, "pkg.a", ["*"])
    ///     .with_rules(Category::Include, "pkg.b", ["[100-200]", ">=300"]);
    /// assert_eq!(doc.include["pkg.b"].len(), 2);
    /// ```
    pub fn with_rules<I, S>(mut self, category: Category, package: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_mut(category)
            .insert(package.to_string(), rules.into_iter().map(Into::into).collect());
        self
    }

    /// Number of packages listed in a category, valid or not.
    pub fn package_count(&self, category: Category) -> usize {
        self.category(category).len()
    }

    /// True if neither category lists any package.
    pub fn is_empty(&self) -> bool {
        self.exclude.is_empty() && self.include.is_empty()
    }

    /// Parse a document from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Serialize the document to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for RuleDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = RuleDocument;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a rule document object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut doc = RuleDocument::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "exclude" => doc.exclude = map.next_value::<LenientCategory>()?.0,
                "include" => doc.include = map.next_value::<LenientCategory>()?.0,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(doc)
    }
}

/// A category value: an object of rule lists, or anything else as empty.
struct LenientCategory(RawRules);

impl<'de> Deserialize<'de> for LenientCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CategoryVisitor)
    }
}

struct CategoryVisitor;

impl<'de> Visitor<'de> for CategoryVisitor {
    type Value = LenientCategory;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of package identifiers to rule lists")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut rules = RawRules::new();
        while let Some((package, list)) = map.next_entry::<String, Vec<RuleText>>()? {
            rules.insert(package, list.into_iter().map(|rule| rule.0).collect());
        }
        Ok(LenientCategory(rules))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(LenientCategory(RawRules::new()))
    }
}

/// One rule list element, kept as text.
struct RuleText(String);

impl<'de> Deserialize<'de> for RuleText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RuleTextVisitor)
    }
}

struct RuleTextVisitor;

impl<'de> Visitor<'de> for RuleTextVisitor {
    type Value = RuleText;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a rule string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(RuleText(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(RuleText(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(RuleText(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(RuleText(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(RuleText(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(RuleText(v.to_string()))
    }
}

/// A locked store persisting a [`RuleDocument`] as JSON.
///
/// Loads fall back to an empty document.
pub fn rule_store(paths: StorePaths) -> LockedStore<RuleDocument> {
    LockedStore::new(
        paths,
        RuleDocument::to_json,
        RuleDocument::from_json,
        RuleDocument::default,
    )
}
