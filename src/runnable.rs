use crate::model::ExecState;
use crate::registry::{Handler, HandlerRegistry};
use crate::store::TaskStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened after attempting one fire of a [`ScheduledRunnable`]. The scheduler's live
/// timer loop uses this to decide whether to compute another fire time or stop ticking the job
#[derive(Debug, PartialEq, Eq)]
pub enum FireOutcome {
    /// The row was no longer `Running` by the time this fire was due (an admin op raced the
    /// timer) — no state was touched, nothing ran
    Skipped,
    /// The handler ran and `exec_count` has not yet reached `max_exec_count` — keep ticking
    Continue,
    /// `exec_count` reached `max_exec_count` on this fire — stop ticking, the row is removed
    Exhausted,
    /// The handler could not be resolved, or ran and returned an error — row moved to `Error`
    Errored,
}

/// [`ScheduledRunnable`] performs exactly one fire attempt for a job: re-fetch its row, confirm
/// it is still `Running`, stamp `last_exec_time` and bump `exec_count`, then invoke the
/// resolved handler. It holds no timer state of its own — [`crate::scheduler::Scheduler`] owns
/// the live timer and calls [`ScheduledRunnable::fire`] once per tick
///
/// # Fire Steps
/// 1. Re-fetch the [`crate::model::ExecDetail`] by key
/// 2. If it is not `Running`, stop — a pause/cancel/delete raced this tick
/// 3. Resolve its [`crate::model::TaskHandler`] and look it up in the [`HandlerRegistry`]; on
///    failure mark the row `Error` and stop
/// 4. Atomically bump `exec_count`/`last_exec_time` in the store
/// 5. Invoke the handler. An `Err` marks the row `Error`; caught here, never propagated to the
///    scheduling pool. Otherwise, report [`FireOutcome::Exhausted`] once the bumped count
///    reaches `max_exec_count`, else [`FireOutcome::Continue`]
pub struct ScheduledRunnable {
    store: Arc<dyn TaskStore>,
    registry: Arc<HandlerRegistry>,
}

impl ScheduledRunnable {
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<HandlerRegistry>) -> Self {
        ScheduledRunnable { store, registry }
    }

    pub async fn fire(&self, exec_key: &str) -> FireOutcome {
        let exec = match self.store.get_exec(exec_key).await {
            Ok(exec) => exec,
            Err(e) => {
                error!(exec_key, error = %e, "fire: exec row vanished mid-flight");
                return FireOutcome::Skipped;
            }
        };
        if exec.state != ExecState::Running {
            debug!(exec_key, state = ?exec.state, "fire: row no longer running, skipping");
            return FireOutcome::Skipped;
        }

        let handler = match self.store.get_handler(&exec.task_handler_key).await {
            Ok(handler) => handler,
            Err(e) => {
                warn!(exec_key, error = %e, "fire: task handler row missing");
                let _ = self
                    .store
                    .update_state_to_error(exec_key, format!("task handler missing: {e}"))
                    .await;
                return FireOutcome::Errored;
            }
        };

        let callable = match self
            .registry
            .resolve(&handler.bean_class_name, handler.bean_name.as_deref())
        {
            Ok(callable) => callable,
            Err(e) => {
                warn!(exec_key, error = %e, "fire: handler not found in registry");
                let _ = self.store.update_state_to_error(exec_key, e.to_string()).await;
                return FireOutcome::Errored;
            }
        };

        let now = chrono::Local::now();
        let count = match self.store.increment_exec_count(exec_key, now).await {
            Ok(count) => count,
            Err(e) => {
                error!(exec_key, error = %e, "fire: failed to persist exec count bump");
                return FireOutcome::Errored;
            }
        };

        debug!(exec_key, count, "firing job");
        match callable.call().await {
            Ok(()) => {
                if matches!(exec.max_exec_count, Some(max) if count >= max) {
                    debug!(exec_key, count, "job reached max_exec_count");
                    // The row is about to be removed by the caller, but stamp end_time first so
                    // a concurrent reader racing the deletion still sees a consistent "ended" row
                    if let Ok(mut fresh) = self.store.get_exec(exec_key).await {
                        fresh.end_time = Some(chrono::Local::now());
                        let _ = self.store.update_exec(fresh).await;
                    }
                    FireOutcome::Exhausted
                } else {
                    FireOutcome::Continue
                }
            }
            Err(msg) => {
                warn!(exec_key, error = %msg, "handler returned an error");
                if let Err(store_err) = self.store.update_state_to_error(exec_key, msg).await {
                    error!(exec_key, error = %store_err, "failed to persist Error state");
                }
                FireOutcome::Errored
            }
        }
    }
}
