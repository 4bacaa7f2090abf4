//! Fallback execution path: a shared engine on a background worker thread.
//!
//! Hosts that cannot afford a disposable engine per run can ship jobs to a
//! single long-lived worker instead. The bridge surface and the
//! input/output contract are identical to [`crate::SandboxExecutor`]'s, but
//! every job is evaluated on one engine that lives for the worker's whole
//! lifetime and carries none of the sandbox ceilings — this path offers
//! **no confinement guarantee** and callers must treat it as the weaker
//! alternative.
//!
//! Jobs are answered in submission order (FIFO per worker); ordering across
//! concurrently submitted jobs from different callers is unspecified.

use crate::bridge::Bridge;
use crate::error::{Result as ScriptResult, ScriptError};
use crate::executor::{IsolationLevel, ScriptExecutor};
use async_trait::async_trait;
use relay_core::Envs;
use rhai::{Dynamic, Engine, Scope};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// One queued fallback run. This is the only shape exchanged with the
/// worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptJob {
    /// Guest script source
    pub script: String,
    /// Environment snapshot the run starts from
    pub envs: Envs,
    /// Request body backing `ph.generateHD()`
    #[serde(rename = "requestBody")]
    pub request_body: String,
}

/// Reply message for one [`ScriptJob`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    /// Mutated snapshot, or the run's diagnostic string
    pub results: std::result::Result<Envs, String>,
}

struct Dispatch {
    job: ScriptJob,
    reply: oneshot::Sender<ScriptOutcome>,
}

/// The non-isolated fallback executor.
///
/// Dropping the executor closes the job channel; the worker thread drains
/// what was already queued and exits.
#[derive(Debug)]
pub struct WorkerExecutor {
    tx: mpsc::Sender<Dispatch>,
}

impl WorkerExecutor {
    /// Spawn the worker thread and its shared engine.
    pub fn spawn() -> relay_core::Result<Self> {
        let (tx, rx) = mpsc::channel::<Dispatch>();
        thread::Builder::new()
            .name("script-worker".into())
            .spawn(move || worker_loop(rx))?;
        warn!("fallback script worker started; runs are not confined");
        Ok(Self { tx })
    }

    /// Queue one job and await its outcome message.
    pub async fn submit(&self, job: ScriptJob) -> ScriptOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        let dispatch = Dispatch {
            job,
            reply: reply_tx,
        };
        if self.tx.send(dispatch).is_err() {
            return ScriptOutcome {
                results: Err(ScriptError::initialization("script worker is gone").to_string()),
            };
        }
        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => ScriptOutcome {
                results: Err(
                    ScriptError::initialization("script worker dropped the reply").to_string()
                ),
            },
        }
    }
}

fn worker_loop(rx: mpsc::Receiver<Dispatch>) {
    // One engine for every job this worker will ever run: the documented
    // confinement gap of the fallback path.
    let mut engine = Engine::new();
    Bridge::install(&mut engine);

    while let Ok(Dispatch { job, reply }) = rx.recv() {
        let results =
            run_job(&engine, &job).map_err(|e| format!("Script execution failed: {}", e));
        let _ = reply.send(ScriptOutcome { results });
    }
    debug!("script worker shutting down");
}

fn run_job(engine: &Engine, job: &ScriptJob) -> ScriptResult<Envs> {
    let bridge = Bridge::new(&job.envs, &job.request_body);
    let mut scope = Scope::new();
    bridge.bind(&mut scope);
    let ast = engine.compile(&job.script)?;
    engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast)?;
    Ok(bridge.snapshot())
}

#[async_trait]
impl ScriptExecutor for WorkerExecutor {
    fn isolation(&self) -> IsolationLevel {
        IsolationLevel::None
    }

    async fn execute(
        &self,
        script: &str,
        envs: &Envs,
        request_body: &str,
    ) -> std::result::Result<Envs, String> {
        self.submit(ScriptJob {
            script: script.to_string(),
            envs: envs.clone(),
            request_body: request_body.to_string(),
        })
        .await
        .results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Variable;

    #[test]
    fn job_messages_round_trip_through_serde() {
        let job = ScriptJob {
            script: r#"pw.env.set("k", "v");"#.into(),
            envs: Envs {
                global: vec![Variable::new("k", "g")],
                selected: vec![],
            },
            request_body: "{}".into(),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("requestBody"));
        assert_eq!(serde_json::from_str::<ScriptJob>(&json).unwrap(), job);

        let outcome = ScriptOutcome {
            results: Err("Script execution failed: boom".into()),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(serde_json::from_str::<ScriptOutcome>(&json).unwrap(), outcome);
    }

    #[tokio::test]
    async fn worker_runs_jobs_in_submission_order() {
        let worker = WorkerExecutor::spawn().unwrap();
        let envs = Envs::default();
        let first = worker
            .execute(r#"pw.env.set("n", "1");"#, &envs, "")
            .await
            .unwrap();
        let second = worker
            .execute(r#"pw.env.set("n", "2");"#, &envs, "")
            .await
            .unwrap();
        assert_eq!(first.get("n").unwrap().value, "1");
        assert_eq!(second.get("n").unwrap().value, "2");
    }

    #[tokio::test]
    async fn faults_carry_the_fallback_prefix() {
        let worker = WorkerExecutor::spawn().unwrap();
        let err = worker
            .execute(r#"throw "kaboom";"#, &Envs::default(), "")
            .await
            .unwrap_err();
        assert!(err.starts_with("Script execution failed:"));
        assert!(err.contains("kaboom"));
    }
}
