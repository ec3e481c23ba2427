use crate::errors::SchedulerResult;
use crate::model::ExecState;
use crate::scheduler::Scheduler;
use tracing::{debug, info};

/// Runs once at startup, after [`crate::registration::register`] has ingested every
/// [`crate::model::HandlerDeclaration`]/[`crate::model::ExecutionSpec`] pair the host declares,
/// and before the scheduler is considered live
///
/// It reads every non-terminal [`crate::model::ExecDetail`] via [`crate::store::TaskStore::recover`]
/// and re-arms it through [`Scheduler::resume_task`] (not [`Scheduler::schedule_task`], which is
/// only legal from `Init`). `Init`, `Running`, and `Paused` rows are all re-armed — a `Paused`
/// row is re-armed deliberately, since pausing was a "stop ticking but stay resumable" decision
/// the restart should honor by putting it straight back to `Running`, matching how an always-on
/// process would have behaved had it paused and then the host called resume. A `Running` row
/// found at boot means the previous process died mid-flight with no live timer actually
/// ticking it anymore, so it gets the same re-arm treatment. `Blocked` rows are re-armed too:
/// maybe the handler the registry was missing for is now present after this restart's
/// registration pass. Rows a prior run already drove to `Error` are left alone — an operator has
/// to resume those explicitly
pub async fn recover(scheduler: &Scheduler) -> SchedulerResult<usize> {
    let execs = scheduler.store().recover().await?;
    let mut armed = 0;
    for exec in execs {
        match exec.state {
            ExecState::Error => {
                debug!(exec_key = %exec.key, "recover: skipping row left in Error");
                continue;
            }
            _ => {
                scheduler.resume_task(&exec.key).await?;
                armed += 1;
            }
        }
    }
    info!(armed, "recovery complete");
    Ok(armed)
}
