use typed_builder::TypedBuilder;

/// Which backing [`crate::store::TaskStore`] a [`SchedulerConfig`] should construct. `Redis` is
/// reserved for a future backend and is rejected at [`crate::scheduler::Scheduler`] construction
/// time today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    InMemory,
    #[cfg(feature = "sqlite-store")]
    Sqlite,
    Redis,
}

/// [`SchedulerConfig`] is the builder-configured set of values that shape a
/// [`crate::scheduler::Scheduler`]'s construction: how many fires can run concurrently, how long
/// shutdown waits for in-flight fires to drain, and (when `enable_storage` is set) how to reach
/// the durable store
///
/// # Default Value(s)
/// Every field has a default suitable for a quick demo: no durable storage, a pool of 8
/// live-timer slots, and a 60 second shutdown grace period
///
/// # See Also
/// - [`crate::scheduler::Scheduler`]
/// - [`crate::store::TaskStore`]
#[derive(Debug, Clone, TypedBuilder)]
pub struct SchedulerConfig {
    /// Whether a durable `TaskStore` should be constructed at all. When `false`, an
    /// [`crate::store::memory::InMemoryTaskStore`] is used regardless of `storage_type`
    #[builder(default = false)]
    pub enable_storage: bool,

    #[builder(default)]
    pub storage_type: StorageType,

    #[builder(default, setter(strip_option))]
    pub data_source_url: Option<String>,

    #[builder(default, setter(strip_option))]
    pub username: Option<String>,

    #[builder(default, setter(strip_option))]
    pub password: Option<String>,

    /// Maximum number of jobs allowed to hold a live timer (be `Running`) at once. Arming a job
    /// beyond this count is a rejection: it goes `Blocked` and retries with backoff
    #[builder(default = 8)]
    pub pool_size: usize,

    /// How long [`crate::scheduler::Scheduler::shutdown`] waits for in-flight live timers to
    /// finish their current fire before abandoning them
    #[builder(default = 60)]
    pub await_termination_seconds: u64,
}
