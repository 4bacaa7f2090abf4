//! Run orchestration: the outward-facing execute contract.

use crate::sandbox::{Sandbox, SandboxConfig};
use async_trait::async_trait;
use relay_core::Envs;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confinement level offered by an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationLevel {
    /// One disposable engine per run; guest code cannot reach host state
    /// outside the bridge
    Isolated,
    /// Shared engine, no per-run confinement (see [`crate::WorkerExecutor`])
    None,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolated => write!(f, "isolated"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Executes pre-request scripts against an environment snapshot.
///
/// Contract, identical across implementations so callers can treat them
/// interchangeably: the input snapshot is never mutated; exactly one of a
/// new snapshot or a diagnostic string comes back per run; the execution
/// context is always released, on the success and the failure path alike.
#[async_trait]
pub trait ScriptExecutor: Send + Sync + fmt::Debug {
    /// The confinement guarantee this executor provides.
    fn isolation(&self) -> IsolationLevel;

    /// Run `script` against a copy of `envs`, with `request_body` available
    /// to `ph.generateHD()`.
    async fn execute(
        &self,
        script: &str,
        envs: &Envs,
        request_body: &str,
    ) -> std::result::Result<Envs, String>;
}

/// The isolated execution path: a fresh sandboxed engine per run.
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    /// Create an executor with default engine ceilings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor with custom engine ceilings.
    pub fn with_config(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Synchronous form of [`ScriptExecutor::execute`]: evaluation blocks
    /// the calling thread until the guest completes or faults.
    pub fn run(
        &self,
        script: &str,
        envs: &Envs,
        request_body: &str,
    ) -> std::result::Result<Envs, String> {
        Sandbox::with_config(&self.config, envs, request_body)
            .eval(script)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ScriptExecutor for SandboxExecutor {
    fn isolation(&self) -> IsolationLevel {
        IsolationLevel::Isolated
    }

    async fn execute(
        &self,
        script: &str,
        envs: &Envs,
        request_body: &str,
    ) -> std::result::Result<Envs, String> {
        self.run(script, envs, request_body)
    }
}
