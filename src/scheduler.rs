use crate::clock::{SchedulerClock, SystemClock};
use crate::config::SchedulerConfig;
use crate::errors::SchedulerResult;
use crate::model::ExecState;
use crate::registry::HandlerRegistry;
use crate::runnable::{FireOutcome, ScheduledRunnable};
use crate::store::TaskStore;
use crate::trigger::{CronTrigger, Trigger};
use crate::utils::{date_time_to_system_time, system_time_to_date_time};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Starting backoff delay before the first retried arm attempt: 5 attempts total, doubling
/// each time (1s, 2s, 4s, 8s, 16s)
const RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_ATTEMPTS: u32 = 5;

/// The delay before the `n`th retry (0-indexed). A pure function so the backoff schedule is
/// testable without waiting out real sleeps
fn backoff_delay(attempt: u32) -> Duration {
    RETRY_INITIAL_DELAY * 2u32.pow(attempt)
}

/// [`Scheduler`] is the live-timer table and admin surface for every scheduled job. It owns:
///
/// - a [`TaskStore`] for durable schedule/state
/// - a [`HandlerRegistry`] for resolving callables
/// - a [`SchedulerClock`] for idling and reading the time
/// - a `tokio::sync::Semaphore`-bounded pool of live-timer slots (the Rust-idiomatic reading of
///   an "externally-supplied scheduling thread pool", since every fire here is `async`)
///
/// Exactly one live timer task exists per `Running` row, and that task holds one pool permit
/// for as long as it runs. Arming a job when the pool is saturated is a rejection: the row goes
/// `Blocked` while [`Scheduler::schedule_task`]/[`Scheduler::resume_task`] retry with backoff,
/// returning to `Running` on success or `Error` once retries are exhausted
///
/// # Admin Surface
/// [`Scheduler::schedule_task`], [`Scheduler::pause_task`], [`Scheduler::resume_task`],
/// [`Scheduler::cancel_task`], [`Scheduler::delete_task`] are the five mutating operations named
/// in the external interface; [`Scheduler::shutdown`] drains in-flight fires on process exit
///
/// # See Also
/// - [`TaskStore`]
/// - [`HandlerRegistry`]
/// - [`SchedulerClock`]
/// - [`crate::recovery::recover`]
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    registry: Arc<HandlerRegistry>,
    clock: Arc<dyn SchedulerClock>,
    live_timers: Arc<DashMap<String, JoinHandle<()>>>,
    semaphore: Arc<Semaphore>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<HandlerRegistry>,
        clock: Arc<dyn SchedulerClock>,
        config: SchedulerConfig,
    ) -> Self {
        let pool_size = config.pool_size.max(1);
        Scheduler {
            store,
            registry,
            clock,
            live_timers: Arc::new(DashMap::new()),
            semaphore: Arc::new(Semaphore::new(pool_size)),
            config,
        }
    }

    /// Convenience constructor using the real-time [`SystemClock`]
    pub fn with_system_clock(
        store: Arc<dyn TaskStore>,
        registry: Arc<HandlerRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Scheduler::new(store, registry, Arc::new(SystemClock), config)
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Arms a job currently `Init`. Scheduling a job that is already `Running` — or any other
    /// non-`Init` state — is an illegal/duplicate request: logged at `debug` and reported as
    /// success, per the admin surface's idempotent-retry expectation
    pub async fn schedule_task(&self, exec_key: &str) -> SchedulerResult<()> {
        let exec = self.store.get_exec(exec_key).await?;
        if exec.state != ExecState::Init {
            debug!(exec_key, state = ?exec.state, "schedule_task: not Init, treating as success");
            return Ok(());
        }
        self.arm_with_retry(exec_key).await
    }

    /// Re-arms a job from any state except `Error` (`Init`, `Paused`, `Blocked`, or `Running`).
    /// `Running` is only a true no-op when this process already holds a live timer for the key —
    /// a `Running` row with no matching entry in `live_timers` means a prior process died with
    /// the durable row never transitioned back, which is exactly what [`crate::recovery::recover`]
    /// finds at boot, so it is re-armed like any other non-`Error` state. Resuming an `Error` row
    /// is an illegal request: logged at `debug` and reported as success
    pub async fn resume_task(&self, exec_key: &str) -> SchedulerResult<()> {
        let exec = self.store.get_exec(exec_key).await?;
        if exec.state == ExecState::Error {
            debug!(exec_key, "resume_task: row is in Error, treating as success");
            return Ok(());
        }
        if self.live_timers.contains_key(exec_key) {
            debug!(exec_key, "resume_task: already armed in this process, treating as success");
            return Ok(());
        }
        self.arm_with_retry(exec_key).await
    }

    /// Cancels the live timer before marking the row `Paused`. This ordering matters: if the
    /// mark happened first, a fire already in flight on this job's timer task could read
    /// `Running` again on its post-idle recheck and arm another iteration before the abort lands
    pub async fn pause_task(&self, exec_key: &str) -> SchedulerResult<()> {
        let exec = self.store.get_exec(exec_key).await?;
        if exec.state != ExecState::Running {
            debug!(exec_key, state = ?exec.state, "pause_task: not running, treating as success");
            return Ok(());
        }
        if let Some((_, handle)) = self.live_timers.remove(exec_key) {
            handle.abort();
        }
        self.store.update_state(exec_key, ExecState::Paused).await?;
        Ok(())
    }

    /// Stops the live timer without deleting the durable row — mechanically identical to
    /// [`Scheduler::pause_task`]. The two are kept as distinct admin operations because the
    /// external interface names both, but this crate has no state strictly between "ticking"
    /// and "not ticking, resumable" to distinguish them by
    pub async fn cancel_task(&self, exec_key: &str) -> SchedulerResult<()> {
        self.pause_task(exec_key).await
    }

    pub async fn delete_task(&self, exec_key: &str) -> SchedulerResult<()> {
        if let Some((_, handle)) = self.live_timers.remove(exec_key) {
            handle.abort();
        }
        // Stamp end_time before removing the row: a concurrent reader racing the deletion (e.g.
        // an admin list call) sees a consistent "scheduling ended" row rather than nothing
        if let Ok(mut exec) = self.store.get_exec(exec_key).await {
            exec.end_time = Some(system_time_to_date_time(self.clock.now().await));
            let _ = self.store.update_exec(exec).await;
        }
        self.store.delete_exec(exec_key).await
    }

    /// Drains every live timer task and waits up to `await_termination_seconds` for them to
    /// finish their current in-flight fire before aborting whatever remains. Durable state is
    /// left exactly as the last completed fire wrote it — shutdown performs no store mutations
    /// of its own
    pub async fn shutdown(&self) {
        // Collect keys before removing entries: iterating a DashMap while removing from it
        // invalidates the iterator, so gather first and mutate after
        let keys: Vec<String> = self.live_timers.iter().map(|entry| entry.key().clone()).collect();
        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, handle)) = self.live_timers.remove(&key) {
                handles.push(handle);
            }
        }

        let deadline = Duration::from_secs(self.config.await_termination_seconds);
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(deadline, drain).await.is_err() {
            warn!("shutdown: timed out waiting for in-flight fires to drain, aborting the rest");
        }
    }

    /// Sweeps `live_timers` for entries whose durable row is no longer `Running` — e.g. a row an
    /// admin paused or deleted out from under a timer that hadn't reached its next tick yet to
    /// notice — and cancels + drops them. Run before every arm attempt so a stale entry never
    /// blocks a fresh one from reusing that pool slot, and so `live_timers` never drifts from the
    /// durable truth for longer than the next schedule/resume call
    async fn sweep_stale_live_timers(&self) {
        // Collect keys before removing entries: iterating a DashMap while removing from it
        // invalidates the iterator, so gather first and mutate after
        let keys: Vec<String> = self.live_timers.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            let stale = match self.store.get_exec(&key).await {
                Ok(exec) => exec.state != ExecState::Running,
                Err(_) => true,
            };
            if stale {
                if let Some((_, handle)) = self.live_timers.remove(&key) {
                    debug!(exec_key = %key, "sweep: removing live timer for a row no longer Running");
                    handle.abort();
                }
            }
        }
    }

    /// Tries to reserve a live-timer slot, retrying on pool saturation up to
    /// [`RETRY_MAX_ATTEMPTS`] with delays doubling from [`RETRY_INITIAL_DELAY`]. The row sits in
    /// `Blocked` while a retry is pending, returns to `Running` once a slot frees up, or becomes
    /// `Error` once every attempt is spent. Never returns an `Err` itself — pool rejection is
    /// entirely communicated through `exec_detail.state`, same as a fire failure
    async fn arm_with_retry(&self, exec_key: &str) -> SchedulerResult<()> {
        self.sweep_stale_live_timers().await;
        for attempt in 0..RETRY_MAX_ATTEMPTS {
            match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => {
                    self.store.update_state(exec_key, ExecState::Running).await?;
                    self.arm(exec_key.to_string(), permit);
                    return Ok(());
                }
                Err(_) if attempt + 1 == RETRY_MAX_ATTEMPTS => {
                    warn!(exec_key, attempt, "scheduling pool rejected task, retries exhausted");
                    self.store
                        .update_state_to_error(
                            exec_key,
                            format!("scheduling pool rejected task `{exec_key}` after {RETRY_MAX_ATTEMPTS} attempts"),
                        )
                        .await?;
                    return Ok(());
                }
                Err(_) => {
                    debug!(exec_key, attempt, "scheduling pool saturated, will retry");
                    self.store.update_state(exec_key, ExecState::Blocked).await?;
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
        Ok(())
    }

    /// Spawns the live timer task for `exec_key`. The task owns `permit` for its entire
    /// lifetime — dropping it (on pause/cancel/delete/exhaustion/error) releases the pool slot
    fn arm(&self, exec_key: String, permit: OwnedSemaphorePermit) {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let clock = self.clock.clone();
        let live_timers = self.live_timers.clone();
        let key_for_table = exec_key.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let runnable = ScheduledRunnable::new(store.clone(), registry.clone());
            loop {
                let exec = match store.get_exec(&exec_key).await {
                    Ok(exec) => exec,
                    Err(_) => break,
                };
                if exec.state != ExecState::Running {
                    break;
                }

                let trigger = match CronTrigger::new(exec.cron_expr.clone()) {
                    Ok(trigger) => trigger,
                    Err(e) => {
                        let _ = store.update_state_to_error(&exec_key, e.to_string()).await;
                        break;
                    }
                };

                let now_local = system_time_to_date_time(clock.now().await);
                let next_local = match trigger.next_after(&now_local) {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        let _ = store.delete_exec(&exec_key).await;
                        break;
                    }
                    Err(e) => {
                        let _ = store.update_state_to_error(&exec_key, e.to_string()).await;
                        break;
                    }
                };
                clock.idle_to(date_time_to_system_time(next_local)).await;

                match runnable.fire(&exec_key).await {
                    FireOutcome::Continue => continue,
                    FireOutcome::Skipped => break,
                    FireOutcome::Exhausted => {
                        let _ = store.delete_exec(&exec_key).await;
                        break;
                    }
                    FireOutcome::Errored => break,
                }
            }
            live_timers.remove(&exec_key);
        });

        self.live_timers.insert(key_for_table, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::model::{ExecDetail, TaskHandler};
    use crate::registry::Handler;
    use crate::store::memory::InMemoryTaskStore;
    use async_trait::async_trait;
    use chrono::Local;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::SystemTime;

    #[derive(Debug)]
    struct CountingHandler(Arc<AtomicU32>);

    #[async_trait]
    impl Handler for CountingHandler {
        async fn call(&self) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn seed_exec(key: &str, handler_key: &str, cron: &str, max: Option<u64>) -> ExecDetail {
        ExecDetail {
            key: key.to_string(),
            desc: None,
            cron_expr: cron.to_string(),
            task_handler_key: handler_key.to_string(),
            init_time: Local::now(),
            end_time: None,
            last_exec_time: None,
            exec_count: 0,
            max_exec_count: max,
            state: ExecState::Init,
            error_msg: None,
        }
    }

    #[test]
    fn backoff_delay_doubles_from_one_second() {
        let expected = [1u64, 2, 4, 8, 16];
        for (attempt, secs) in expected.iter().enumerate() {
            assert_eq!(backoff_delay(attempt as u32), Duration::from_secs(*secs));
        }
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_state() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(HandlerRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        registry.register("demo.Job", None, Arc::new(CountingHandler(counter.clone())));
        store
            .put_handler(TaskHandler::new("demo.Job", None, "demo.Job", "run"))
            .await
            .unwrap();
        store.put_exec(seed_exec("job-1", "demo.Job", "* * * * *", None)).await.unwrap();

        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        let scheduler = Scheduler::new(store.clone(), registry, clock, SchedulerConfig::builder().build());

        scheduler.schedule_task("job-1").await.unwrap();
        assert_eq!(store.get_exec("job-1").await.unwrap().state, ExecState::Running);

        scheduler.pause_task("job-1").await.unwrap();
        assert_eq!(store.get_exec("job-1").await.unwrap().state, ExecState::Paused);
        assert!(store.get_exec("job-1").await.unwrap().end_time.is_some());
        assert!(!scheduler.live_timers.contains_key("job-1"));

        scheduler.resume_task("job-1").await.unwrap();
        assert_eq!(store.get_exec("job-1").await.unwrap().state, ExecState::Running);
        assert!(store.get_exec("job-1").await.unwrap().end_time.is_none());
    }

    #[tokio::test]
    async fn schedule_on_running_job_is_idempotent_success() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(HandlerRegistry::new());
        registry.register("demo.Job", None, Arc::new(CountingHandler(Arc::new(AtomicU32::new(0)))));
        store
            .put_handler(TaskHandler::new("demo.Job", None, "demo.Job", "run"))
            .await
            .unwrap();
        store.put_exec(seed_exec("job-2", "demo.Job", "* * * * *", None)).await.unwrap();

        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        let scheduler = Scheduler::new(store.clone(), registry, clock, SchedulerConfig::builder().build());

        scheduler.schedule_task("job-2").await.unwrap();
        assert!(scheduler.schedule_task("job-2").await.is_ok());
        assert_eq!(store.get_exec("job-2").await.unwrap().state, ExecState::Running);
    }

    #[tokio::test]
    async fn delete_task_removes_durable_row() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(HandlerRegistry::new());
        store
            .put_handler(TaskHandler::new("demo.Job", None, "demo.Job", "run"))
            .await
            .unwrap();
        store.put_exec(seed_exec("job-3", "demo.Job", "* * * * *", None)).await.unwrap();

        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        let scheduler = Scheduler::new(store.clone(), registry, clock, SchedulerConfig::builder().build());
        scheduler.delete_task("job-3").await.unwrap();
        assert!(store.get_exec("job-3").await.is_err());
    }

    // The retry loop's `tokio::time::sleep` calls are real wall-clock sleeps (they're
    // independent of the VirtualClock the scheduler's own timer uses), so pause and
    // auto-advance tokio's clock rather than actually waiting out ~15s of backoff
    #[tokio::test(start_paused = true)]
    async fn pool_saturation_blocks_then_errors_after_retries_exhausted() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(HandlerRegistry::new());
        store
            .put_handler(TaskHandler::new("demo.Job", None, "demo.Job", "run"))
            .await
            .unwrap();
        store.put_exec(seed_exec("job-4", "demo.Job", "* * * * *", None)).await.unwrap();

        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        let config = SchedulerConfig::builder().pool_size(1).build();
        let scheduler = Scheduler::new(store.clone(), registry, clock, config);

        // Occupy the only pool slot with a held permit so the next arm attempt is rejected
        let _permit = scheduler.semaphore.clone().try_acquire_owned().unwrap();

        scheduler.schedule_task("job-4").await.unwrap();
        let exec = store.get_exec("job-4").await.unwrap();
        assert_eq!(exec.state, ExecState::Error);
        assert!(exec.end_time.is_some());
    }

    #[tokio::test]
    async fn arming_a_job_sweeps_stale_live_timer_entries() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(HandlerRegistry::new());
        store
            .put_handler(TaskHandler::new("demo.Job", None, "demo.Job", "run"))
            .await
            .unwrap();
        // "job-stale" is in live_timers (as if an admin paused/deleted it out from under its own
        // timer before the timer noticed on its next tick) but its durable row is Paused, not
        // Running. "job-fresh" is what triggers arming and, with it, the sweep.
        store.put_exec(seed_exec("job-stale", "demo.Job", "* * * * *", None)).await.unwrap();
        store.update_state("job-stale", ExecState::Paused).await.unwrap();
        store.put_exec(seed_exec("job-fresh", "demo.Job", "* * * * *", None)).await.unwrap();

        let clock = Arc::new(VirtualClock::new(SystemTime::now()));
        let scheduler = Scheduler::new(store.clone(), registry, clock, SchedulerConfig::builder().build());

        let stale_handle = tokio::spawn(async { std::future::pending::<()>().await });
        scheduler.live_timers.insert("job-stale".to_string(), stale_handle);

        scheduler.schedule_task("job-fresh").await.unwrap();
        tokio::task::yield_now().await;

        assert!(!scheduler.live_timers.contains_key("job-stale"));
    }
}
