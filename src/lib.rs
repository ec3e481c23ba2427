//! A cron-driven task scheduler middleware: an in-memory scheduling engine, a durable task
//! store, and a handler-discovery registry that maps persisted string keys back to invokable
//! callables.
//!
//! The pieces a host application wires together are, in boot order:
//!
//! 1. [`registry::HandlerRegistry`] — register every callable the host owns
//! 2. [`store::TaskStore`] — [`store::memory::InMemoryTaskStore`] or, behind the
//!    `sqlite-store` feature, [`store::sqlite::SqliteTaskStore`]
//! 3. [`registration::register`] — ingest this boot's handler/schedule declarations
//! 4. [`scheduler::Scheduler::new`] — build the scheduler over the registry and store
//! 5. [`recovery::recover`] — re-arm every non-terminal job left over from the last run
//!
//! What this crate deliberately does not do: expose an HTTP admin surface, wire a dependency
//! injection container, map rows through a SQL ORM layer, configure application-wide logging,
//! or parse cron expressions itself (that's [`trigger::CronTrigger`]'s job, via the
//! `cron_parser` crate).

pub mod admin;
pub mod clock;
pub mod config;
pub mod errors;
pub mod model;
pub mod recovery;
pub mod registration;
pub mod registry;
pub mod runnable;
pub mod scheduler;
pub mod store;
pub mod trigger;

pub(crate) mod utils;
