use crate::errors::SchedulerResult;
use crate::model::{ExecDetail, ExecState, ExecutionSpec, HandlerDeclaration, TaskHandler};
use crate::store::TaskStore;
use chrono::Local;
use std::hash::Hasher;
use tracing::debug;
use uuid::Uuid;

/// FNV-1a, hand-rolled rather than pulled from `std::hash::DefaultHasher`: the standard
/// library's hasher is seeded randomly per process (`RandomState`), so the same declaration
/// would mint a different key on every restart. Key stability across restarts is what lets
/// [`register`] reuse an existing row's `exec_count` instead of resetting it to zero
fn fnv1a(parts: &[&str]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for part in parts {
        for byte in part.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(PRIME);
        }
        hash ^= 0xff;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn handler_key(decl: &HandlerDeclaration) -> String {
    format!("{:016x}", fnv1a(&[&decl.bean_class_name, &decl.method_name]))
}

fn exec_key(decl: &HandlerDeclaration, spec: &ExecutionSpec, index: usize) -> String {
    format!(
        "{:016x}",
        fnv1a(&[
            &decl.bean_class_name,
            &decl.method_name,
            &spec.cron_expr,
            &index.to_string(),
        ])
    )
}

/// Ingests a batch of `(HandlerDeclaration, Vec<ExecutionSpec>)` pairs supplied by the host
/// application at startup, before [`crate::recovery::recover`] runs. Handler and exec rows are
/// derived deterministically from their declaration, so calling this again on the next restart
/// with the same declarations produces the same keys: existing rows are left with their
/// `exec_count` intact rather than being re-created at zero
pub async fn register(
    store: &dyn TaskStore,
    declarations: Vec<(HandlerDeclaration, Vec<ExecutionSpec>)>,
) -> SchedulerResult<()> {
    for (decl, specs) in declarations {
        let handler_key = handler_key(&decl);
        if store.get_handler(&handler_key).await.is_err() {
            store
                .put_handler(TaskHandler::new(
                    handler_key.clone(),
                    decl.bean_name.clone(),
                    decl.bean_class_name.clone(),
                    decl.method_name.clone(),
                ))
                .await?;
            debug!(handler_key, "registered new task handler");
        }

        for (index, spec) in specs.iter().enumerate() {
            let key = exec_key(&decl, spec, index);
            if store.get_exec(&key).await.is_ok() {
                debug!(exec_key = %key, "exec row already present, leaving exec_count untouched");
                continue;
            }
            store
                .put_exec(ExecDetail {
                    key: key.clone(),
                    desc: spec.desc.clone(),
                    cron_expr: spec.cron_expr.clone(),
                    task_handler_key: handler_key.clone(),
                    init_time: Local::now(),
                    end_time: None,
                    last_exec_time: None,
                    exec_count: 0,
                    max_exec_count: spec.max_exec_count,
                    state: ExecState::Init,
                    error_msg: None,
                })
                .await?;
            debug!(exec_key = %key, "registered new exec detail");
        }
    }
    Ok(())
}

/// Creates a single handler/exec pair outside the batch boot-time path, keyed with a fresh
/// `Uuid` rather than a derived hash. Unlike [`register`], calling this twice always produces
/// two distinct rows — there is no stable input to re-derive the same key from, so this is for
/// jobs an API call creates on demand, not for anything [`crate::recovery::recover`] needs to
/// find again under the same identity across a restart
pub async fn create_ad_hoc(
    store: &dyn TaskStore,
    decl: HandlerDeclaration,
    spec: ExecutionSpec,
) -> SchedulerResult<String> {
    let handler_key = Uuid::new_v4().to_string();
    store
        .put_handler(TaskHandler::new(
            handler_key.clone(),
            decl.bean_name,
            decl.bean_class_name,
            decl.method_name,
        ))
        .await?;

    let exec_key = Uuid::new_v4().to_string();
    store
        .put_exec(ExecDetail {
            key: exec_key.clone(),
            desc: spec.desc,
            cron_expr: spec.cron_expr,
            task_handler_key: handler_key,
            init_time: Local::now(),
            end_time: None,
            last_exec_time: None,
            exec_count: 0,
            max_exec_count: spec.max_exec_count,
            state: ExecState::Init,
            error_msg: None,
        })
        .await?;
    debug!(exec_key = %exec_key, "created ad-hoc exec detail");
    Ok(exec_key)
}
