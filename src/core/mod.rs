//! core
//!
//! Core domain types, the rule language, and persistence.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Category, VersionCode
//! - [`version_rule`] - Rule string grammar and version matching
//! - [`document`] - Raw persisted rule document and its store
//! - [`lock`] - Advisory file lock, non-reentrant within a process
//! - [`store`] - Generic crash-consistent single-value store
//! - [`rules`] - Built-in and runtime rule tables and match queries
//! - [`resolver`] - Installed package version lookup
//! - [`policy`] - Per-app tunnel routing and user selection helpers
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Invalid rules cannot be represented once parsed
//! - Persisted state is never observed half-written
//! - Failures degrade to well-defined defaults instead of propagating

pub mod config;
pub mod document;
pub mod lock;
pub mod policy;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod types;
pub mod version_rule;
