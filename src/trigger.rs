use crate::errors::SchedulerError;
use chrono::{DateTime, Local};
use std::fmt::Debug;
use std::ops::Deref;

/// [`Trigger`] computes the next point in time a job should fire, given the last point it
/// considered. It is a pure function of `(schedule, now)` — it never reads or writes any
/// [`crate::model::ExecDetail`] state itself; [`crate::scheduler::Scheduler`] is the only
/// caller
///
/// `Ok(None)` is the never-again sentinel: the schedule is exhausted and the job should not
/// be re-armed. A cron expression never produces this (it always has a next occurrence), but
/// other trigger kinds built on top of this trait may
///
/// # Object Safety
/// This trait is object safe, matching how the scheduler stores triggers behind `Arc<dyn Trigger>`
pub trait Trigger: Debug + Send + Sync {
    /// Calculates the next time to fire, strictly after `after`
    fn next_after(&self, after: &DateTime<Local>) -> Result<Option<DateTime<Local>>, SchedulerError>;
}

impl<T> Trigger for T
where
    T: Deref + Send + Sync + Debug,
    T::Target: Trigger,
{
    fn next_after(&self, after: &DateTime<Local>) -> Result<Option<DateTime<Local>>, SchedulerError> {
        self.deref().next_after(after)
    }
}

/// [`CronTrigger`] is the [`Trigger`] implementation used for every [`crate::model::ExecDetail`]
/// in this crate: the cron parser itself is out of scope, consumed here as a capability via the
/// `cron_parser` crate
///
/// # Construction
/// Validate the expression up front with [`CronTrigger::new`] — it parses once against the
/// current time so a malformed expression fails at registration time rather than at first fire
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CronTrigger(String);

impl CronTrigger {
    pub fn new(cron_expr: impl Into<String>) -> Result<Self, SchedulerError> {
        let cron_expr = cron_expr.into();
        cron_parser::parse(&cron_expr, &Local::now())
            .map_err(|e| SchedulerError::InvalidCron(cron_expr.clone(), e.to_string()))?;
        Ok(CronTrigger(cron_expr))
    }

    pub fn expression(&self) -> &str {
        &self.0
    }
}

impl Trigger for CronTrigger {
    fn next_after(&self, after: &DateTime<Local>) -> Result<Option<DateTime<Local>>, SchedulerError> {
        let next = cron_parser::parse(&self.0, after)
            .map_err(|e| SchedulerError::InvalidCron(self.0.clone(), e.to_string()))?;
        Ok(Some(next))
    }
}
