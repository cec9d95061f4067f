//! In-memory doubles for the external collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{LlmError, StorageError, VcsError};
use crate::models::TextGenerator;
use crate::storage::Storage;
use crate::tools::vcs::ExternalVcs;

/// One recorded `generate` call
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub prompt: String,
    pub role_context: String,
}

/// Replays queued responses in order; fails once the queue is empty
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, role_context: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(GeneratorCall {
            prompt: prompt.to_string(),
            role_context: role_context.to_string(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Response("script exhausted".to_string())))
    }
}

/// A mutation recorded by `InMemoryVcs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOp {
    CreateBranch(String),
    Stage(Vec<PathBuf>),
    Commit(String),
    Push(String, String),
    /// Proposal title
    Propose(String),
}

/// Version control fake with injectable failures
pub struct InMemoryVcs {
    repository: bool,
    dirty: bool,
    proposal_tool: bool,
    authenticated: bool,
    proposal_output: String,
    failures: HashMap<&'static str, String>,
    ops: Mutex<Vec<VcsOp>>,
}

impl Default for InMemoryVcs {
    fn default() -> Self {
        Self {
            repository: true,
            dirty: false,
            proposal_tool: true,
            authenticated: true,
            proposal_output: "https://github.com/acme/shop/pull/1\n".to_string(),
            failures: HashMap::new(),
            ops: Mutex::new(Vec::new()),
        }
    }
}

impl InMemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn not_a_repository(mut self) -> Self {
        self.repository = false;
        self
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    pub fn without_proposal_tool(mut self) -> Self {
        self.proposal_tool = false;
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn with_proposal_output(mut self, output: &str) -> Self {
        self.proposal_output = output.to_string();
        self
    }

    /// Make one operation fail: create_branch, stage, commit, push or propose
    pub fn fail_on(mut self, op: &'static str, message: &str) -> Self {
        self.failures.insert(op, message.to_string());
        self
    }

    pub fn ops(&self) -> Vec<VcsOp> {
        self.ops.lock().unwrap().clone()
    }

    fn attempt(&self, op: &'static str, record: VcsOp) -> Result<(), VcsError> {
        if let Some(message) = self.failures.get(op) {
            return Err(VcsError::CommandFailed {
                command: format!("git {}", op.replace('_', " ")),
                message: message.clone(),
            });
        }
        self.ops.lock().unwrap().push(record);
        Ok(())
    }
}

#[async_trait]
impl ExternalVcs for InMemoryVcs {
    async fn ensure_repository(&self) -> Result<(), VcsError> {
        if self.repository {
            Ok(())
        } else {
            Err(VcsError::NotARepository("/work/tree".to_string()))
        }
    }

    async fn is_dirty(&self, _exclude: &[PathBuf]) -> Result<bool, VcsError> {
        Ok(self.dirty)
    }

    async fn status_summary(&self) -> Result<String, VcsError> {
        Ok("## main\n".to_string())
    }

    async fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        self.attempt("create_branch", VcsOp::CreateBranch(name.to_string()))
    }

    async fn stage(&self, files: &[PathBuf]) -> Result<(), VcsError> {
        self.attempt("stage", VcsOp::Stage(files.to_vec()))
    }

    async fn commit(&self, message: &str) -> Result<String, VcsError> {
        self.attempt("commit", VcsOp::Commit(message.to_string()))?;
        Ok("0a1b2c3d".to_string())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.attempt("push", VcsOp::Push(remote.to_string(), branch.to_string()))
    }

    async fn check_proposal_tool(&self) -> Result<(), VcsError> {
        if !self.proposal_tool {
            return Err(VcsError::ToolMissing);
        }
        if !self.authenticated {
            return Err(VcsError::Unauthenticated);
        }
        Ok(())
    }

    async fn propose_change(
        &self,
        title: &str,
        _body: &str,
        _base: &str,
    ) -> Result<String, VcsError> {
        self.attempt("propose", VcsOp::Propose(title.to_string()))?;
        Ok(self.proposal_output.clone())
    }
}

/// Storage fake keyed by path
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, String>>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.to_string());
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io {
                action: "write",
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        Ok(self.get(path))
    }

    async fn ensure_directory(&self, _path: &Path) -> Result<(), StorageError> {
        Ok(())
    }
}
