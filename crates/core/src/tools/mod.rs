//! # Deterministic Tools
//!
//! Wrappers around the two outside programs the workflow trusts for
//! ground truth: a parser for generated code and version control.
//!
//! ## Modules
//!
//! - `syntax` - Compile-equivalent syntax check for generated sources
//! - `vcs` - git and GitHub CLI operations behind `ExternalVcs`

pub mod syntax;
pub mod vcs;
