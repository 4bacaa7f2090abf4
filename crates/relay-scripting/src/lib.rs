//! # Relay Scripting
//!
//! Sandboxed execution of user-authored pre-request scripts.
//!
//! A pre-request script runs against a narrow host bridge — two globals,
//! `pw` (environment access) and `ph` (crypto helpers) — and nothing else.
//! The script receives a run-local copy of the caller's environment
//! snapshot; `pw.env.set` is the only operation that feeds back into the
//! returned snapshot.
//!
//! ## Execution paths
//!
//! - [`SandboxExecutor`] — one disposable [`rhai`] engine per run with
//!   resource ceilings; the guest cannot reach host state outside the bridge.
//! - [`WorkerExecutor`] — fallback for hosts that cannot afford a per-run
//!   engine: one shared engine on a background worker thread. Same bridge
//!   contract, **no confinement guarantee**.
//!
//! ## Bridge surface
//!
//! - `pw.env.get(key)` / `pw.env.getResolve(key)` / `pw.env.set(key, value)`
//!   / `pw.env.resolve(value)`
//! - `ph.generateHD()` — base64 SHA-256 digest of the request body
//! - `ph.generateJWT(header, claims, privateKey)` — RS256 signed token

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod bridge;

pub mod crypto;
pub mod error;
pub mod executor;
pub mod sandbox;
pub mod template;
pub mod worker;

pub use error::{Result, ScriptError};
pub use executor::{IsolationLevel, SandboxExecutor, ScriptExecutor};
pub use sandbox::{Sandbox, SandboxConfig};
pub use template::{parse_template, resolve_or_raw, TemplateError};
pub use worker::{ScriptJob, ScriptOutcome, WorkerExecutor};

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::error::{Result, ScriptError};
    pub use crate::executor::{IsolationLevel, SandboxExecutor, ScriptExecutor};
    pub use crate::sandbox::{Sandbox, SandboxConfig};
    pub use crate::worker::{ScriptJob, ScriptOutcome, WorkerExecutor};
}
