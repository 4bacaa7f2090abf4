//! The host bridge exposed to guest scripts.
//!
//! Guest code sees exactly two globals: `pw` (workflow namespace, with an
//! `env` property) and `ph` (helper namespace). Every operation is a
//! registered function on a host type — a closed capability table; there is
//! no reflective access to anything else.
//!
//! The run-local environment copy lives in a shared cell owned by the
//! [`Bridge`] and borrowed by each handle, so mutations survive the engine
//! and can be read back after teardown. `getResolve` deliberately resolves
//! against the baseline snapshot captured at run start, while `resolve` uses
//! the current (possibly already-mutated) copy.

use crate::crypto;
use crate::template;
use relay_core::Envs;
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

const EXPECTED_KEY: &str = "Expected key to be a string";
const EXPECTED_VALUE: &str = "Expected value to be a string";
const EXPECTED_PRIVATE_KEY: &str = "Expected private key to be a string";

/// Re-marshal a guest value into a host string, or raise a bridge error the
/// guest can catch.
fn expect_string(value: Dynamic, message: &str) -> Result<String, Box<EvalAltResult>> {
    value.into_string().map_err(|_| message.into())
}

/// `pw.env` — guest-facing environment operations.
#[derive(Debug, Clone)]
pub(crate) struct EnvApi {
    /// Run-local mutable copy, shared by every handle of one run.
    cell: Arc<Mutex<Envs>>,
    /// Snapshot taken at run start; `getResolve` resolves against it.
    baseline: Arc<Envs>,
}

impl EnvApi {
    fn lock(&self) -> MutexGuard<'_, Envs> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&mut self, key: Dynamic) -> Result<Dynamic, Box<EvalAltResult>> {
        let key = expect_string(key, EXPECTED_KEY)?;
        Ok(self
            .lock()
            .get(&key)
            .map_or(Dynamic::UNIT, |var| var.value.clone().into()))
    }

    fn get_resolve(&mut self, key: Dynamic) -> Result<Dynamic, Box<EvalAltResult>> {
        let key = expect_string(key, EXPECTED_KEY)?;
        let raw = match self.lock().get(&key) {
            Some(var) => var.value.clone(),
            None => return Ok(Dynamic::UNIT),
        };
        Ok(template::resolve_or_raw(&raw, &self.baseline).into())
    }

    fn set(&mut self, key: Dynamic, value: Dynamic) -> Result<(), Box<EvalAltResult>> {
        let key = expect_string(key, EXPECTED_KEY)?;
        let value = expect_string(value, EXPECTED_VALUE)?;
        trace!(key = %key, "pw.env.set");
        let mut cell = self.lock();
        *cell = cell.with_var(&key, &value);
        Ok(())
    }

    fn resolve(&mut self, value: Dynamic) -> Result<String, Box<EvalAltResult>> {
        let value = expect_string(value, EXPECTED_VALUE)?;
        Ok(template::resolve_or_raw(&value, &self.lock()))
    }
}

/// `pw` — the top-level workflow namespace.
#[derive(Debug, Clone)]
pub(crate) struct PwApi {
    env: EnvApi,
}

/// `ph` — the top-level helper namespace.
#[derive(Debug, Clone)]
pub(crate) struct PhApi {
    request_body: Arc<str>,
}

impl PhApi {
    fn generate_hd(&mut self) -> String {
        crypto::body_digest(&self.request_body)
    }

    fn generate_jwt(
        &mut self,
        header: Dynamic,
        claims: Dynamic,
        private_key: Dynamic,
    ) -> Result<String, Box<EvalAltResult>> {
        // Guest maps are re-marshalled into host-native JSON before any of
        // them reach the signing primitive.
        let header: serde_json::Value = rhai::serde::from_dynamic(&header)?;
        let claims: serde_json::Value = rhai::serde::from_dynamic(&claims)?;
        let private_key = expect_string(private_key, EXPECTED_PRIVATE_KEY)?;
        crypto::sign_jwt(&header, &claims, &private_key).map_err(|e| e.to_string().into())
    }
}

/// One run's bridge: the shared environment cell plus the namespace handles
/// bound into the guest scope.
#[derive(Debug)]
pub(crate) struct Bridge {
    cell: Arc<Mutex<Envs>>,
    pw: PwApi,
    ph: PhApi,
}

impl Bridge {
    /// Capture a run-local copy of `envs`; the caller's snapshot is never
    /// touched again.
    pub(crate) fn new(envs: &Envs, request_body: &str) -> Self {
        let cell = Arc::new(Mutex::new(envs.clone()));
        let env = EnvApi {
            cell: Arc::clone(&cell),
            baseline: Arc::new(envs.clone()),
        };
        Self {
            cell,
            pw: PwApi { env },
            ph: PhApi {
                request_body: Arc::from(request_body),
            },
        }
    }

    /// Register the bridge types and operations on an engine.
    ///
    /// Registration is instance-free: state rides on the handles pushed by
    /// [`Bridge::bind`], so one engine can serve many bridges.
    pub(crate) fn install(engine: &mut Engine) {
        engine.register_type_with_name::<PwApi>("PwNamespace");
        engine.register_type_with_name::<EnvApi>("EnvNamespace");
        engine.register_type_with_name::<PhApi>("PhNamespace");

        engine.register_get("env", |pw: &mut PwApi| pw.env.clone());
        engine.register_fn("get", EnvApi::get);
        engine.register_fn("getResolve", EnvApi::get_resolve);
        engine.register_fn("set", EnvApi::set);
        engine.register_fn("resolve", EnvApi::resolve);
        engine.register_fn("generateHD", PhApi::generate_hd);
        engine.register_fn("generateJWT", PhApi::generate_jwt);
    }

    /// Bind this run's namespace handles into a guest scope.
    pub(crate) fn bind(&self, scope: &mut Scope<'_>) {
        scope.push("pw", self.pw.clone());
        scope.push("ph", self.ph.clone());
    }

    /// Final state of the run-local environment copy.
    pub(crate) fn snapshot(&self) -> Envs {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
