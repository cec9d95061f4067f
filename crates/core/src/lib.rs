//! # Testsmith Core
//!
//! Turns a natural-language test scenario into a pytest module through a
//! four-stage LLM pipeline, then optionally publishes it as a pull request.
//!
//! ## Architecture
//!
//! - `workflow/` - Stage state machine, events, and the `TestGenerator` orchestrator
//! - `skills/` - Stage prompts and the tool-using publish agent
//! - `models` - Text-generation backends (Ollama, OpenAI-compatible)
//! - `extract` - Recovers source code from free-form model output
//! - `naming` - File, identifier, and branch names
//! - `tools/` - Syntax validation and version control
//! - `publish/` - Branch, commit, push, and pull request creation
//! - `storage` - Artifact persistence
//! - `config` - Layered settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use testsmith_core::config::Settings;
//! use testsmith_core::storage::FsStorage;
//! use testsmith_core::tools::vcs::GitCli;
//! use testsmith_core::workflow::TestGenerator;
//!
//! let settings = Settings::discover(None).await?;
//! let generator = Arc::from(settings.model.create_client()?);
//! let vcs = Arc::new(GitCli::from_settings(".", &settings.github));
//! let mut orchestrator =
//!     TestGenerator::new(settings, generator, Arc::new(FsStorage::current_dir()), vcs);
//! let result = orchestrator.generate_tests(scenario, "login.txt", None).await;
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod naming;
pub mod publish;
pub mod schema;
pub mod skills;
pub mod storage;
pub mod tools;
pub mod workflow;

#[cfg(test)]
pub mod testing;
