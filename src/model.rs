use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The lifecycle state of an [`ExecDetail`]. Transitions are driven exclusively by
/// [`crate::scheduler::Scheduler`] and [`crate::recovery::recover`]; nothing else is allowed
/// to write this field directly
///
/// ```text
/// Init --schedule_task--> Running <--pause/resume--> Paused
///                            |  ^
///              pool reject  |  | retry succeeds
///                            v  |
///                          Blocked --retries exhausted--> Error
///                            |
///              Running ------+---- fire failed / handler unresolvable --> Error
///
/// any state --delete_task or exec_count == max_exec_count--> (row removed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecState {
    /// Freshly registered, never armed
    Init,
    /// A live timer holds a pool permit and is ticking
    Running,
    /// Timer cancelled, durable row kept, can be resumed
    Paused,
    /// The scheduling pool rejected the last arm attempt; a retry is in flight
    Blocked,
    /// Terminal: either a fire failed, the handler could not be resolved, or every retry in
    /// [`crate::scheduler::Scheduler`]'s pool-rejection backoff was exhausted
    Error,
}

impl ExecState {
    /// Integer encoding used by the durable store layout (`exec_detail.state`)
    pub fn code(self) -> i32 {
        match self {
            ExecState::Init => 0,
            ExecState::Running => 1,
            ExecState::Paused => 2,
            ExecState::Blocked => 3,
            ExecState::Error => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExecState::Init),
            1 => Some(ExecState::Running),
            2 => Some(ExecState::Paused),
            3 => Some(ExecState::Blocked),
            4 => Some(ExecState::Error),
            _ => None,
        }
    }
}

/// A stable, serializable identity for a callable. It never changes across restarts for the
/// same `(bean_class_name, bean_name, method_name)` triple — that stability is what lets
/// [`crate::registration`] avoid re-minting handler rows (and resetting `exec_count`) on every
/// boot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandler {
    pub key: String,
    pub bean_name: Option<String>,
    pub bean_class_name: String,
    pub method_name: String,
}

impl TaskHandler {
    pub fn new(
        key: impl Into<String>,
        bean_name: Option<String>,
        bean_class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        TaskHandler {
            key: key.into(),
            bean_name,
            bean_class_name: bean_class_name.into(),
            method_name: method_name.into(),
        }
    }
}

/// The mutable schedule-and-state record for one scheduled job. One [`ExecDetail`] always
/// points at exactly one [`TaskHandler`] via `task_handler_key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecDetail {
    pub key: String,
    pub desc: Option<String>,
    pub cron_expr: String,
    pub task_handler_key: String,
    pub init_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub last_exec_time: Option<DateTime<Local>>,
    pub exec_count: u64,
    pub max_exec_count: Option<u64>,
    pub state: ExecState,
    pub error_msg: Option<String>,
}

impl ExecDetail {
    /// `true` once `exec_count` has reached `max_exec_count`; such a job is never re-armed
    pub fn exhausted(&self) -> bool {
        matches!(self.max_exec_count, Some(max) if self.exec_count >= max)
    }
}

/// Declares the existence of a callable, supplied at startup by the host application via
/// [`crate::registration::register`]. This is distinct from [`TaskHandler`] (the durable,
/// keyed record) — a `HandlerDeclaration` is the input that produces or matches one
#[derive(Debug, Clone)]
pub struct HandlerDeclaration {
    pub bean_name: Option<String>,
    pub bean_class_name: String,
    pub method_name: String,
}

impl HandlerDeclaration {
    pub fn new(
        bean_name: Option<String>,
        bean_class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        HandlerDeclaration {
            bean_name,
            bean_class_name: bean_class_name.into(),
            method_name: method_name.into(),
        }
    }
}

/// Declares one schedule to attach to a [`HandlerDeclaration`] at registration time
#[derive(Debug, Clone)]
pub struct ExecutionSpec {
    pub desc: Option<String>,
    pub cron_expr: String,
    pub max_exec_count: Option<u64>,
}

impl ExecutionSpec {
    pub fn new(cron_expr: impl Into<String>) -> Self {
        ExecutionSpec {
            desc: None,
            cron_expr: cron_expr.into(),
            max_exec_count: None,
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_max_exec_count(mut self, max: u64) -> Self {
        self.max_exec_count = Some(max);
        self
    }
}
