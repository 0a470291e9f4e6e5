//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Category`] - Which policy list a rule belongs to (exclude or include)
//! - [`VersionCode`] - Integer build identifier of an installed package
//!
//! # Examples
//!
//! ```
//! use tunnelrules::core::types::Category;
//!
//! let category: Category = "exclude".parse().unwrap();
//! assert_eq!(category, Category::Exclude);
//! assert_eq!(category.to_string(), "exclude");
//!
//! assert!("sideways".parse::<Category>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer identifying a specific build of a package.
///
/// Signed so that the wildcard rule is well defined for every value a
/// resolver could hand back, including zero and negative codes.
pub type VersionCode = i64;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid category '{0}', must be one of: exclude, include")]
    InvalidCategory(String),
}

/// Rule category: which policy list a package's rules belong to.
///
/// The two categories are orthogonal. A package may carry rules in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Packages routed around the tunnel.
    Exclude,
    /// Packages forced through the tunnel.
    Include,
}

impl Category {
    /// Both categories, in persisted-document order.
    pub const ALL: [Category; 2] = [Category::Exclude, Category::Include];

    /// The key used for this category in the persisted document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Exclude => "exclude",
            Category::Include => "include",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(Category::Exclude),
            "include" => Ok(Category::Include),
            _ => Err(TypeError::InvalidCategory(s.to_string())),
        }
    }
}
