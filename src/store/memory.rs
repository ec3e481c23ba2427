use crate::errors::{SchedulerError, SchedulerResult};
use crate::model::{ExecDetail, ExecState, TaskHandler};
use crate::store::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use dashmap::DashMap;

/// [`InMemoryTaskStore`] is a `DashMap`-backed [`TaskStore`] with no persistence across
/// restarts. It exists for tests, demos, and hosts that accept losing schedule state on
/// process death in exchange for zero setup
///
/// # Construction
/// [`InMemoryTaskStore::new`] starts empty
///
/// # See Also
/// - [`TaskStore`]
/// - [`crate::store::sqlite::SqliteTaskStore`]
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    handlers: DashMap<String, TaskHandler>,
    execs: DashMap<String, ExecDetail>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        InMemoryTaskStore {
            handlers: DashMap::new(),
            execs: DashMap::new(),
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put_handler(&self, handler: TaskHandler) -> SchedulerResult<()> {
        self.handlers.insert(handler.key.clone(), handler);
        Ok(())
    }

    async fn get_handler(&self, key: &str) -> SchedulerResult<TaskHandler> {
        self.handlers
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))
    }

    async fn list_handlers(&self) -> SchedulerResult<Vec<TaskHandler>> {
        Ok(self.handlers.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn put_exec(&self, exec: ExecDetail) -> SchedulerResult<()> {
        self.execs.insert(exec.key.clone(), exec);
        Ok(())
    }

    async fn get_exec(&self, key: &str) -> SchedulerResult<ExecDetail> {
        self.execs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))
    }

    async fn list_execs(&self) -> SchedulerResult<Vec<ExecDetail>> {
        Ok(self.execs.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn delete_exec(&self, key: &str) -> SchedulerResult<()> {
        self.execs.remove(key);
        Ok(())
    }

    async fn update_exec(&self, exec: ExecDetail) -> SchedulerResult<()> {
        if !self.execs.contains_key(&exec.key) {
            return Err(SchedulerError::NotFound(exec.key));
        }
        self.execs.insert(exec.key.clone(), exec);
        Ok(())
    }

    async fn update_state(&self, key: &str, state: ExecState) -> SchedulerResult<()> {
        let mut entry = self
            .execs
            .get_mut(key)
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;
        // Paused means scheduling just ended; Running means it just resumed (un-ending it).
        // Blocked/Init are left alone — a pool-rejection retry hasn't ended anything yet.
        match state {
            ExecState::Paused => entry.end_time = Some(Local::now()),
            ExecState::Running => entry.end_time = None,
            _ => {}
        }
        entry.state = state;
        Ok(())
    }

    async fn update_state_to_error(&self, key: &str, error_msg: String) -> SchedulerResult<()> {
        let mut entry = self
            .execs
            .get_mut(key)
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;
        entry.state = ExecState::Error;
        entry.error_msg = Some(error_msg);
        entry.end_time = Some(Local::now());
        Ok(())
    }

    async fn increment_exec_count(
        &self,
        key: &str,
        last_exec_time: DateTime<Local>,
    ) -> SchedulerResult<u64> {
        let mut entry = self
            .execs
            .get_mut(key)
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;
        entry.exec_count += 1;
        entry.last_exec_time = Some(last_exec_time);
        Ok(entry.exec_count)
    }

    async fn recover(&self) -> SchedulerResult<Vec<ExecDetail>> {
        Ok(self
            .execs
            .iter()
            .filter(|entry| !matches!(entry.value().state, ExecState::Error))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn sample_exec(key: &str) -> ExecDetail {
        ExecDetail {
            key: key.to_string(),
            desc: None,
            cron_expr: "* * * * *".to_string(),
            task_handler_key: "handler-1".to_string(),
            init_time: Local::now(),
            end_time: None,
            last_exec_time: None,
            exec_count: 0,
            max_exec_count: None,
            state: ExecState::Init,
            error_msg: None,
        }
    }

    #[tokio::test]
    async fn increment_exec_count_is_monotonic() {
        let store = InMemoryTaskStore::new();
        store.put_exec(sample_exec("job-1")).await.unwrap();
        assert_eq!(store.increment_exec_count("job-1", Local::now()).await.unwrap(), 1);
        assert_eq!(store.increment_exec_count("job-1", Local::now()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recover_excludes_error_state() {
        let store = InMemoryTaskStore::new();
        store.put_exec(sample_exec("job-ok")).await.unwrap();
        store.put_exec(sample_exec("job-err")).await.unwrap();
        store.update_state_to_error("job-err", "boom".to_string()).await.unwrap();
        let recovered = store.recover().await.unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].key, "job-ok");
    }

    #[tokio::test]
    async fn get_exec_missing_errors() {
        let store = InMemoryTaskStore::new();
        assert!(matches!(
            store.get_exec("missing").await,
            Err(SchedulerError::NotFound(_))
        ));
    }
}
