use crate::errors::{SchedulerError, SchedulerResult};
use crate::model::{ExecDetail, ExecState, TaskHandler};
use crate::store::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Row, SqlitePool};

/// [`SqliteTaskStore`] is the durable [`TaskStore`] backed by `sqlx`'s sqlite driver. It uses
/// runtime-checked queries rather than `sqlx::query!`'s compile-time macros, since schema
/// verification against a live database at build time is not assumed here
///
/// The layout is the two tables named in this crate's external interface: `task_handler` and
/// `exec_detail`, `exec_detail.task_handler_key` foreign-keying `task_handler.key`
///
/// # Construction
/// [`SqliteTaskStore::connect`] opens (creating if absent) the database at `data_source_url`
/// and runs the bundled schema migration
///
/// # See Also
/// - [`TaskStore`]
/// - [`crate::store::memory::InMemoryTaskStore`]
#[derive(Debug)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct HandlerRow {
    key: String,
    bean_name: Option<String>,
    bean_class_name: String,
    method_name: String,
}

impl From<HandlerRow> for TaskHandler {
    fn from(row: HandlerRow) -> Self {
        TaskHandler {
            key: row.key,
            bean_name: row.bean_name,
            bean_class_name: row.bean_class_name,
            method_name: row.method_name,
        }
    }
}

#[derive(FromRow)]
struct ExecRow {
    key: String,
    desc: Option<String>,
    cron_expr: String,
    task_handler_key: String,
    init_time: DateTime<Local>,
    end_time: Option<DateTime<Local>>,
    last_exec_time: Option<DateTime<Local>>,
    exec_count: i64,
    max_exec_count: Option<i64>,
    state: i64,
    error_msg: Option<String>,
}

impl TryFrom<ExecRow> for ExecDetail {
    type Error = SchedulerError;

    fn try_from(row: ExecRow) -> Result<Self, Self::Error> {
        Ok(ExecDetail {
            key: row.key.clone(),
            desc: row.desc,
            cron_expr: row.cron_expr,
            task_handler_key: row.task_handler_key,
            init_time: row.init_time,
            end_time: row.end_time,
            last_exec_time: row.last_exec_time,
            exec_count: row.exec_count as u64,
            max_exec_count: row.max_exec_count.map(|v| v as u64),
            state: ExecState::from_code(row.state as i32)
                .ok_or_else(|| SchedulerError::Store(format!("unknown state code `{}` on row `{}`", row.state, row.key)))?,
            error_msg: row.error_msg,
        })
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS task_handler (
    key TEXT PRIMARY KEY,
    bean_name TEXT,
    bean_class_name TEXT NOT NULL,
    method_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exec_detail (
    key TEXT PRIMARY KEY,
    desc TEXT,
    cron_expr TEXT NOT NULL,
    task_handler_key TEXT NOT NULL REFERENCES task_handler(key),
    init_time TEXT NOT NULL,
    end_time TEXT,
    last_exec_time TEXT,
    exec_count INTEGER NOT NULL DEFAULT 0,
    max_exec_count INTEGER,
    state INTEGER NOT NULL,
    error_msg TEXT
);
"#;

impl SqliteTaskStore {
    pub async fn connect(data_source_url: &str, pool_size: u32) -> SchedulerResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect(data_source_url)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        Ok(SqliteTaskStore { pool })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn put_handler(&self, handler: TaskHandler) -> SchedulerResult<()> {
        sqlx::query(
            "INSERT INTO task_handler (key, bean_name, bean_class_name, method_name) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(key) DO UPDATE SET bean_name=excluded.bean_name, \
             bean_class_name=excluded.bean_class_name, method_name=excluded.method_name",
        )
        .bind(&handler.key)
        .bind(&handler.bean_name)
        .bind(&handler.bean_class_name)
        .bind(&handler.method_name)
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_handler(&self, key: &str) -> SchedulerResult<TaskHandler> {
        let row: HandlerRow = sqlx::query_as("SELECT * FROM task_handler WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;
        Ok(row.into())
    }

    async fn list_handlers(&self) -> SchedulerResult<Vec<TaskHandler>> {
        let rows: Vec<HandlerRow> = sqlx::query_as("SELECT * FROM task_handler")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn put_exec(&self, exec: ExecDetail) -> SchedulerResult<()> {
        sqlx::query(
            "INSERT INTO exec_detail (key, desc, cron_expr, task_handler_key, init_time, \
             end_time, last_exec_time, exec_count, max_exec_count, state, error_msg) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&exec.key)
        .bind(&exec.desc)
        .bind(&exec.cron_expr)
        .bind(&exec.task_handler_key)
        .bind(exec.init_time)
        .bind(exec.end_time)
        .bind(exec.last_exec_time)
        .bind(exec.exec_count as i64)
        .bind(exec.max_exec_count.map(|v| v as i64))
        .bind(exec.state.code() as i64)
        .bind(&exec.error_msg)
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_exec(&self, key: &str) -> SchedulerResult<ExecDetail> {
        let row: ExecRow = sqlx::query_as("SELECT * FROM exec_detail WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?
            .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;
        row.try_into()
    }

    async fn list_execs(&self) -> SchedulerResult<Vec<ExecDetail>> {
        let rows: Vec<ExecRow> = sqlx::query_as("SELECT * FROM exec_detail")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_exec(&self, key: &str) -> SchedulerResult<()> {
        sqlx::query("DELETE FROM exec_detail WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        Ok(())
    }

    async fn update_exec(&self, exec: ExecDetail) -> SchedulerResult<()> {
        let result = sqlx::query(
            "UPDATE exec_detail SET desc=?2, cron_expr=?3, task_handler_key=?4, init_time=?5, \
             end_time=?6, last_exec_time=?7, exec_count=?8, max_exec_count=?9, state=?10, \
             error_msg=?11 WHERE key=?1",
        )
        .bind(&exec.key)
        .bind(&exec.desc)
        .bind(&exec.cron_expr)
        .bind(&exec.task_handler_key)
        .bind(exec.init_time)
        .bind(exec.end_time)
        .bind(exec.last_exec_time)
        .bind(exec.exec_count as i64)
        .bind(exec.max_exec_count.map(|v| v as i64))
        .bind(exec.state.code() as i64)
        .bind(&exec.error_msg)
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::Store(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(SchedulerError::NotFound(exec.key));
        }
        Ok(())
    }

    async fn update_state(&self, key: &str, state: ExecState) -> SchedulerResult<()> {
        // Paused means scheduling just ended; Running means it just resumed (un-ending it).
        // Blocked/Init are left alone — a pool-rejection retry hasn't ended anything yet.
        let result = match state {
            ExecState::Paused => {
                sqlx::query("UPDATE exec_detail SET state=?2, end_time=?3 WHERE key=?1")
                    .bind(key)
                    .bind(state.code() as i64)
                    .bind(Local::now())
                    .execute(&self.pool)
                    .await
            }
            ExecState::Running => {
                sqlx::query("UPDATE exec_detail SET state=?2, end_time=NULL WHERE key=?1")
                    .bind(key)
                    .bind(state.code() as i64)
                    .execute(&self.pool)
                    .await
            }
            _ => {
                sqlx::query("UPDATE exec_detail SET state=?2 WHERE key=?1")
                    .bind(key)
                    .bind(state.code() as i64)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| SchedulerError::Store(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(SchedulerError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn update_state_to_error(&self, key: &str, error_msg: String) -> SchedulerResult<()> {
        let result = sqlx::query(
            "UPDATE exec_detail SET state=?2, error_msg=?3, end_time=?4 WHERE key=?1",
        )
        .bind(key)
        .bind(ExecState::Error.code() as i64)
        .bind(&error_msg)
        .bind(Local::now())
        .execute(&self.pool)
        .await
        .map_err(|e| SchedulerError::Store(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(SchedulerError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn increment_exec_count(
        &self,
        key: &str,
        last_exec_time: DateTime<Local>,
    ) -> SchedulerResult<u64> {
        let row = sqlx::query(
            "UPDATE exec_detail SET exec_count = exec_count + 1, last_exec_time = ?2 \
             WHERE key = ?1 RETURNING exec_count",
        )
        .bind(key)
        .bind(last_exec_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SchedulerError::Store(e.to_string()))?
        .ok_or_else(|| SchedulerError::NotFound(key.to_string()))?;
        let count: i64 = row.try_get("exec_count").map_err(|e| SchedulerError::Store(e.to_string()))?;
        Ok(count as u64)
    }

    async fn recover(&self) -> SchedulerResult<Vec<ExecDetail>> {
        let rows: Vec<ExecRow> = sqlx::query_as("SELECT * FROM exec_detail WHERE state != ?1")
            .bind(ExecState::Error.code() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SchedulerError::Store(e.to_string()))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
