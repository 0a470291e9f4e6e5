//! tunnelrules - rule storage and version-aware app matching for split tunnels
//!
//! Decides which installed applications are managed by a tunnel's
//! split-routing policy, and persists the rules that make that decision.
//!
//! # Architecture
//!
//! - [`core`] - Rule language, locked value store, rule set manager, config
//! - [`cli`] - Command-line interface layer (parses args, delegates to core)
//!
//! # Correctness Invariants
//!
//! 1. The persisted rule file is replaced atomically and never seen partially written
//! 2. Readers of the rule tables see a complete table, never a mix of old and new
//! 3. Invalid rule strings are dropped when tables are built, never matched
//! 4. Storage failures degrade to defaults and are logged, never panicked on

pub mod cli;
pub mod core;
