use thiserror::Error;

/// [`SchedulerError`] is the main enum that contains all the errors which can be thrown by
/// the crate, it uses under the hood [`thiserror`] to make it as smooth sailing to add more
/// errors in the future as possible
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    /// This error is meant to happen when a cron expression fails to parse. It surfaces at
    /// registration time, before a job is ever armed
    #[error("invalid cron expression `{0}`: {1}")]
    InvalidCron(String, String),

    /// This error originates when no `TaskHandler` or `ExecDetail` exists under the given key
    #[error("no record found for key `{0}`")]
    NotFound(String),

    /// This error is meant to happen when the [`crate::registry::HandlerRegistry`] cannot
    /// resolve a `(bean_class_name, bean_name)` pair to a registered callable
    #[error("handler not found for class `{bean_class_name}`, bean `{bean_name:?}`")]
    HandlerNotFound {
        bean_class_name: String,
        bean_name: Option<String>,
    },

    /// This error is meant to happen when the scheduling pool rejects an arm attempt because
    /// it is saturated. Callers retry per the backoff policy in [`crate::scheduler`]
    #[error("scheduling pool rejected task `{0}`")]
    TaskRejected(String),

    /// This error is meant to happen when a user handler returns an error while executing a fire
    #[error("handler for `{0}` failed: {1}")]
    HandlerFailed(String, String),

    /// This error originates when the durable store fails to read or write a record
    #[error("task store error: {0}")]
    Store(String),

    /// This error is meant to happen when configuration is invalid in a way that must fail
    /// startup rather than degrade silently
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
