//! Per-run isolated sandbox lifecycle.
//!
//! Each run owns one disposable engine: allocate, install the bridge,
//! evaluate, extract the result or the fault, drop. [`Sandbox::eval`]
//! consumes the sandbox, so the engine and every value it created are
//! released exactly once on both the success and the failure path.

use crate::bridge::Bridge;
use crate::error::{Result, ScriptError};
use relay_core::Envs;
use rhai::{Dynamic, Engine, Scope};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Engine resource ceilings for one isolated run.
///
/// These bound guest memory pressure on the host. There is deliberately no
/// operation cap and no wall-clock timeout: a runaway guest script blocks
/// its run indefinitely (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Maximum guest string length in bytes
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    /// Maximum guest array length
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,

    /// Maximum guest object-map size
    #[serde(default = "default_max_map_size")]
    pub max_map_size: usize,

    /// Maximum expression nesting depth at global level
    #[serde(default = "default_max_expr_depth")]
    pub max_expr_depth: usize,

    /// Maximum expression nesting depth inside functions
    #[serde(default = "default_max_function_expr_depth")]
    pub max_function_expr_depth: usize,
}

fn default_max_string_size() -> usize {
    1024 * 1024 // 1MB string limit
}

fn default_max_array_size() -> usize {
    10_000
}

fn default_max_map_size() -> usize {
    10_000
}

fn default_max_expr_depth() -> usize {
    25
}

fn default_max_function_expr_depth() -> usize {
    10
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_string_size: default_max_string_size(),
            max_array_size: default_max_array_size(),
            max_map_size: default_max_map_size(),
            max_expr_depth: default_max_expr_depth(),
            max_function_expr_depth: default_max_function_expr_depth(),
        }
    }
}

/// One isolated script run.
///
/// Construction covers the `Created` and `Initialized` phases of the run
/// lifecycle; [`Sandbox::eval`] covers evaluation through disposal.
#[derive(Debug)]
pub struct Sandbox {
    engine: Engine,
    bridge: Bridge,
}

impl Sandbox {
    /// Allocate an engine with default ceilings and capture a run-local copy
    /// of `envs`.
    pub fn new(envs: &Envs, request_body: &str) -> Self {
        Self::with_config(&SandboxConfig::default(), envs, request_body)
    }

    /// Allocate an engine with the given ceilings and install the bridge.
    pub fn with_config(config: &SandboxConfig, envs: &Envs, request_body: &str) -> Self {
        let mut engine = Engine::new();
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(config.max_array_size);
        engine.set_max_map_size(config.max_map_size);
        engine.set_max_expr_depths(config.max_expr_depth, config.max_function_expr_depth);

        Bridge::install(&mut engine);
        debug!("sandbox initialized");

        Self {
            engine,
            bridge: Bridge::new(envs, request_body),
        }
    }

    /// Evaluate the guest script and return the final environment copy.
    ///
    /// Consumes the sandbox: the engine is dropped on every exit path, so a
    /// faulted run cannot leak its instance.
    pub fn eval(self, script: &str) -> Result<Envs> {
        let mut scope = Scope::new();
        self.bridge.bind(&mut scope);

        let ast = match self.engine.compile(script) {
            Ok(ast) => ast,
            Err(e) => {
                warn!(error = %e, "guest script failed to compile");
                return Err(ScriptError::from(e));
            }
        };

        trace!(len = script.len(), "evaluating guest script");
        match self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast) {
            Ok(_) => {
                debug!("guest script completed");
                Ok(self.bridge.snapshot())
            }
            Err(e) => {
                warn!(error = %e, "guest script faulted");
                Err(ScriptError::from(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Variable;

    #[test]
    fn eval_returns_the_mutated_copy() {
        let envs = Envs::default();
        let out = Sandbox::new(&envs, "")
            .eval(r#"pw.env.set("k", "v");"#)
            .unwrap();
        assert_eq!(out.get("k").unwrap().value, "v");
        assert_eq!(envs, Envs::default());
    }

    #[test]
    fn syntax_errors_fault_as_compilation_errors() {
        let err = Sandbox::new(&Envs::default(), "")
            .eval("let = ;")
            .unwrap_err();
        assert!(matches!(err, ScriptError::CompilationError { .. }));
    }

    #[test]
    fn uncaught_throws_fault_with_the_guest_payload() {
        let err = Sandbox::new(&Envs::default(), "")
            .eval(r#"throw "kaboom";"#)
            .unwrap_err();
        assert!(matches!(err, ScriptError::RuntimeError { .. }));
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn guest_can_catch_bridge_errors_and_continue() {
        let out = Sandbox::new(&Envs::default(), "")
            .eval(
                r#"
                    let caught = "";
                    try { pw.env.get(123); } catch (e) { caught = e; }
                    pw.env.set("caught", caught);
                "#,
            )
            .unwrap();
        assert_eq!(out.get("caught").unwrap().value, "Expected key to be a string");
    }

    #[test]
    fn config_defaults_are_applied() {
        let config: SandboxConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_string_size, 1024 * 1024);
        assert_eq!(config.max_array_size, 10_000);
        assert_eq!(config.max_map_size, 10_000);
    }

    #[test]
    fn selected_tier_value_wins_inside_the_guest() {
        let envs = Envs {
            global: vec![Variable::new("k", "g")],
            selected: vec![Variable::new("k", "s")],
        };
        let out = Sandbox::new(&envs, "")
            .eval(r#"pw.env.set("seen", pw.env.get("k"));"#)
            .unwrap();
        assert_eq!(out.get("seen").unwrap().value, "s");
    }
}
