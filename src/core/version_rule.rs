//! core::version_rule
//!
//! The version rule language: parsing rule strings into matchers and
//! evaluating them against a package's version code.
//!
//! # Grammar
//!
//! A rule string encodes exactly one rule. After trimming surrounding
//! whitespace the whole string must match one of:
//!
//! | Form          | Example     | Matches                         |
//! |---------------|-------------|---------------------------------|
//! | wildcard      | `*`         | every version code              |
//! | range         | `[100-200]` | `100 <= v <= 200`               |
//! | comparison    | `>=300`     | `>`, `>=`, `<`, `<=` against v  |
//! | exact         | `150`       | `v == 150`                      |
//!
//! Forms are tried in that order; the first structural match wins.
//! Numbers are unsigned ASCII digit runs. A range whose minimum exceeds
//! its maximum is rejected.
//!
//! # Example
//!
//! ```
//! use tunnelrules::core::version_rule::{any_matches, parse_many, VersionRule};
//!
//! let rules = parse_many(["*", "bogus", "50"]);
//! assert_eq!(rules, vec![VersionRule::Any, VersionRule::Exact(50)]);
//!
//! assert!(any_matches(&rules, 7));
//! assert!(!any_matches(&[], 7));
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use super::types::VersionCode;

/// Why a rule string was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("rule is empty")]
    Empty,

    #[error("unrecognized rule '{0}'")]
    Unrecognized(String),

    #[error("number out of range in rule '{0}'")]
    OutOfRange(String),

    #[error("range minimum exceeds maximum in rule '{0}'")]
    InvertedRange(String),
}

/// Comparison operator for [`VersionRule::Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ComparisonOp {
    /// Operator prefixes, longest first so `>=` is not read as `>`.
    const PREFIXES: [(&'static str, ComparisonOp); 4] = [
        (">=", ComparisonOp::GreaterOrEqual),
        (">", ComparisonOp::Greater),
        ("<=", ComparisonOp::LessOrEqual),
        ("<", ComparisonOp::Less),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterOrEqual => ">=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessOrEqual => "<=",
        }
    }

    fn apply(&self, version_code: VersionCode, value: VersionCode) -> bool {
        match self {
            ComparisonOp::Greater => version_code > value,
            ComparisonOp::GreaterOrEqual => version_code >= value,
            ComparisonOp::Less => version_code < value,
            ComparisonOp::LessOrEqual => version_code <= value,
        }
    }
}

/// A parsed version constraint.
///
/// Instances are only produced by parsing and are immutable. `Range`
/// always satisfies `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionRule {
    /// Matches every version code.
    Any,
    /// Matches one version code.
    Exact(VersionCode),
    /// Matches by integer comparison against `value`.
    Comparison {
        op: ComparisonOp,
        value: VersionCode,
    },
    /// Matches `min..=max`.
    Range { min: VersionCode, max: VersionCode },
}

impl VersionRule {
    /// Parse a single rule string.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleParseError`] describing why the string is not a rule.
    ///
    /// # Example
    ///
    /// ```
    /// use tunnelrules::core::version_rule::{ComparisonOp, VersionRule};
    ///
    /// assert_eq!(VersionRule::parse(" * "), Ok(VersionRule::Any));
    /// assert_eq!(
    ///     VersionRule::parse(">=100"),
    ///     Ok(VersionRule::Comparison { op: ComparisonOp::GreaterOrEqual, value: 100 })
    /// );
    /// assert!(VersionRule::parse("[200-100]").is_err());
    /// ```
    pub fn parse(rule: &str) -> Result<Self, RuleParseError> {
        let rule = rule.trim();
        if rule.is_empty() {
            return Err(RuleParseError::Empty);
        }

        if rule == "*" {
            return Ok(VersionRule::Any);
        }

        if let Some(inner) = rule.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            if let Some((lo, hi)) = inner.split_once('-') {
                if is_digits(lo) && is_digits(hi) {
                    let min = parse_number(lo, rule)?;
                    let max = parse_number(hi, rule)?;
                    if min > max {
                        return Err(RuleParseError::InvertedRange(rule.to_string()));
                    }
                    return Ok(VersionRule::Range { min, max });
                }
            }
        }

        for (prefix, op) in ComparisonOp::PREFIXES {
            if let Some(rest) = rule.strip_prefix(prefix) {
                if is_digits(rest) {
                    let value = parse_number(rest, rule)?;
                    return Ok(VersionRule::Comparison { op, value });
                }
                break;
            }
        }

        if is_digits(rule) {
            return Ok(VersionRule::Exact(parse_number(rule, rule)?));
        }

        Err(RuleParseError::Unrecognized(rule.to_string()))
    }

    /// Check whether a version code satisfies this rule.
    pub fn matches(&self, version_code: VersionCode) -> bool {
        match *self {
            VersionRule::Any => true,
            VersionRule::Exact(v) => version_code == v,
            VersionRule::Comparison { op, value } => op.apply(version_code, value),
            VersionRule::Range { min, max } => min <= version_code && version_code <= max,
        }
    }
}

impl FromStr for VersionRule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRule::parse(s)
    }
}

impl fmt::Display for VersionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRule::Any => f.write_str("*"),
            VersionRule::Exact(v) => write!(f, "{}", v),
            VersionRule::Comparison { op, value } => write!(f, "{}{}", op.as_str(), value),
            VersionRule::Range { min, max } => write!(f, "[{}-{}]", min, max),
        }
    }
}

/// Parse a single rule string, returning `None` if it is invalid.
pub fn parse_one(rule: &str) -> Option<VersionRule> {
    VersionRule::parse(rule).ok()
}

/// Parse a list of rule strings, silently dropping invalid entries.
///
/// The order of the surviving rules is preserved. An input with no valid
/// rules yields an empty vector.
pub fn parse_many<I, S>(rules: I) -> Vec<VersionRule>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    rules
        .into_iter()
        .filter_map(|raw| match VersionRule::parse(raw.as_ref()) {
            Ok(rule) => Some(rule),
            Err(e) => {
                debug!(rule = raw.as_ref(), error = %e, "dropping invalid version rule");
                None
            }
        })
        .collect()
}

/// Logical OR of [`VersionRule::matches`] over `rules`. Empty is `false`.
pub fn any_matches(rules: &[VersionRule], version_code: VersionCode) -> bool {
    rules.iter().any(|rule| rule.matches(version_code))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_number(digits: &str, rule: &str) -> Result<VersionCode, RuleParseError> {
    digits
        .parse::<VersionCode>()
        .map_err(|_| RuleParseError::OutOfRange(rule.to_string()))
}
