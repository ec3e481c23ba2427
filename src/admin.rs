use crate::errors::SchedulerError;
use crate::model::{ExecDetail, ExecutionSpec, HandlerDeclaration, TaskHandler};
use crate::registration::create_ad_hoc;
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};

/// [`AdminEnvelope`] wraps every admin-surface response in the uniform
/// `{code, info, data}` shape, regardless of whether the call succeeded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminEnvelope<T> {
    pub code: i32,
    pub info: String,
    pub data: Option<T>,
}

impl<T> AdminEnvelope<T> {
    pub fn ok(data: T) -> Self {
        AdminEnvelope {
            code: 200,
            info: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_empty() -> Self {
        AdminEnvelope {
            code: 200,
            info: "ok".to_string(),
            data: None,
        }
    }

    pub fn err(error: &SchedulerError) -> Self {
        AdminEnvelope {
            code: error_code(error),
            info: error.to_string(),
            data: None,
        }
    }
}

impl<T: Serialize> AdminEnvelope<T> {
    /// Renders this envelope as the JSON body an admin HTTP layer would hand back to a caller.
    /// This crate stops at the envelope itself (see the HTTP Non-goal) but the wire shape still
    /// needs to actually serialize, not just declare `Serialize`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl<T: for<'de> Deserialize<'de>> AdminEnvelope<T> {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn error_code(error: &SchedulerError) -> i32 {
    match error {
        SchedulerError::InvalidCron(_, _) => 1,
        SchedulerError::NotFound(_) => 2,
        SchedulerError::HandlerNotFound { .. } => 3,
        SchedulerError::TaskRejected(_) => 4,
        SchedulerError::HandlerFailed(_, _) => 5,
        SchedulerError::Store(_) => 6,
        SchedulerError::Configuration(_) => 7,
    }
}

/// Lists every [`ExecDetail`] currently known to the store, admin-surface rendering of
/// [`crate::store::TaskStore::list_execs`]
pub async fn list_execs(scheduler: &Scheduler) -> AdminEnvelope<Vec<ExecDetail>> {
    match scheduler.store().list_execs().await {
        Ok(execs) => AdminEnvelope::ok(execs),
        Err(e) => AdminEnvelope::err(&e),
    }
}

pub async fn query_exec(scheduler: &Scheduler, exec_key: &str) -> AdminEnvelope<ExecDetail> {
    match scheduler.store().get_exec(exec_key).await {
        Ok(exec) => AdminEnvelope::ok(exec),
        Err(e) => AdminEnvelope::err(&e),
    }
}

pub async fn query_handler(scheduler: &Scheduler, handler_key: &str) -> AdminEnvelope<TaskHandler> {
    match scheduler.store().get_handler(handler_key).await {
        Ok(handler) => AdminEnvelope::ok(handler),
        Err(e) => AdminEnvelope::err(&e),
    }
}

pub async fn schedule(scheduler: &Scheduler, exec_key: &str) -> AdminEnvelope<()> {
    match scheduler.schedule_task(exec_key).await {
        Ok(()) => AdminEnvelope::ok_empty(),
        Err(e) => AdminEnvelope::err(&e),
    }
}

pub async fn pause(scheduler: &Scheduler, exec_key: &str) -> AdminEnvelope<()> {
    match scheduler.pause_task(exec_key).await {
        Ok(()) => AdminEnvelope::ok_empty(),
        Err(e) => AdminEnvelope::err(&e),
    }
}

pub async fn resume(scheduler: &Scheduler, exec_key: &str) -> AdminEnvelope<()> {
    match scheduler.resume_task(exec_key).await {
        Ok(()) => AdminEnvelope::ok_empty(),
        Err(e) => AdminEnvelope::err(&e),
    }
}

/// The externally-exposed "cancel" admin operation maps to [`Scheduler::delete_task`], not
/// [`Scheduler::cancel_task`] — the latter is the internal live-timer-stop primitive
/// [`Scheduler::pause_task`] is built on, and isn't part of this surface on its own
pub async fn cancel(scheduler: &Scheduler, exec_key: &str) -> AdminEnvelope<()> {
    match scheduler.delete_task(exec_key).await {
        Ok(()) => AdminEnvelope::ok_empty(),
        Err(e) => AdminEnvelope::err(&e),
    }
}

/// Creates one ad-hoc job, keyed by a fresh `Uuid` rather than a derived hash, and returns the
/// generated exec key so the caller can immediately `schedule` it
pub async fn create(
    scheduler: &Scheduler,
    decl: HandlerDeclaration,
    spec: ExecutionSpec,
) -> AdminEnvelope<String> {
    match create_ad_hoc(scheduler.store().as_ref(), decl, spec).await {
        Ok(exec_key) => AdminEnvelope::ok(exec_key),
        Err(e) => AdminEnvelope::err(&e),
    }
}

pub async fn delete(scheduler: &Scheduler, exec_key: &str) -> AdminEnvelope<()> {
    match scheduler.delete_task(exec_key).await {
        Ok(()) => AdminEnvelope::ok_empty(),
        Err(e) => AdminEnvelope::err(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::config::SchedulerConfig;
    use crate::model::ExecState;
    use crate::registry::HandlerRegistry;
    use crate::store::memory::InMemoryTaskStore;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn fresh_scheduler() -> Scheduler {
        let store: Arc<dyn crate::store::TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(HandlerRegistry::new());
        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        Scheduler::new(store, registry, clock, SchedulerConfig::builder().build())
    }

    #[tokio::test]
    async fn ok_and_ok_empty_report_success_code_200() {
        let envelope = AdminEnvelope::ok(42);
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.data, Some(42));

        let empty: AdminEnvelope<()> = AdminEnvelope::ok_empty();
        assert_eq!(empty.code, 200);
    }

    #[tokio::test]
    async fn envelope_round_trips_through_json() {
        let envelope = AdminEnvelope::ok("exec-1".to_string());
        let json = envelope.to_json().unwrap();
        let decoded: AdminEnvelope<String> = AdminEnvelope::from_json(&json).unwrap();
        assert_eq!(decoded.code, 200);
        assert_eq!(decoded.data, Some("exec-1".to_string()));
    }

    #[tokio::test]
    async fn cancel_deletes_the_row_rather_than_pausing_it() {
        let store: Arc<dyn crate::store::TaskStore> = Arc::new(InMemoryTaskStore::new());
        store
            .put_handler(TaskHandler::new("h-admin", None, "demo.Job", "run"))
            .await
            .unwrap();
        store
            .put_exec(ExecDetail {
                key: "e-admin".to_string(),
                desc: None,
                cron_expr: "* * * * *".to_string(),
                task_handler_key: "h-admin".to_string(),
                init_time: chrono::Local::now(),
                end_time: None,
                last_exec_time: None,
                exec_count: 0,
                max_exec_count: None,
                state: ExecState::Running,
                error_msg: None,
            })
            .await
            .unwrap();

        let registry = Arc::new(HandlerRegistry::new());
        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        let scheduler = Scheduler::new(store.clone(), registry, clock, SchedulerConfig::builder().build());

        let envelope = cancel(&scheduler, "e-admin").await;
        assert_eq!(envelope.code, 200);
        assert!(store.get_exec("e-admin").await.is_err(), "cancel must delete the durable row");
    }

    #[tokio::test]
    async fn schedule_pause_resume_report_success_envelopes() {
        let scheduler = fresh_scheduler();
        let store = scheduler.store().clone();
        store
            .put_exec(ExecDetail {
                key: "e-cycle".to_string(),
                desc: None,
                cron_expr: "* * * * *".to_string(),
                task_handler_key: "missing".to_string(),
                init_time: chrono::Local::now(),
                end_time: None,
                last_exec_time: None,
                exec_count: 0,
                max_exec_count: None,
                state: ExecState::Init,
                error_msg: None,
            })
            .await
            .unwrap();

        assert_eq!(schedule(&scheduler, "e-cycle").await.code, 200);
        assert_eq!(pause(&scheduler, "e-cycle").await.code, 200);
        assert_eq!(store.get_exec("e-cycle").await.unwrap().state, ExecState::Paused);
        assert_eq!(resume(&scheduler, "e-cycle").await.code, 200);
        assert_eq!(store.get_exec("e-cycle").await.unwrap().state, ExecState::Running);
    }

    #[tokio::test]
    async fn query_exec_not_found_reports_the_not_found_error_code() {
        let scheduler = fresh_scheduler();
        let envelope = query_exec(&scheduler, "missing").await;
        assert_eq!(envelope.code, error_code(&SchedulerError::NotFound("missing".to_string())));
        assert!(envelope.data.is_none());
    }
}
