//! Periodic task scheduling.
//!
//! [`TaskScheduler`] runs one background loop that wakes on a fixed tick and
//! runs every task whose interval has elapsed since its last run. Tasks due
//! in the same tick run one after another in registration order.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use confidant_scheduler::{SchedulerConfig, TaskScheduler};
//!
//! let scheduler = TaskScheduler::new(SchedulerConfig::default());
//! let sessions = sessions.clone();
//! scheduler.add_periodic_task("session_cleanup", Duration::from_secs(60), move || {
//!     let sessions = sessions.clone();
//!     async move {
//!         sessions.cleanup_expired();
//!         Ok(())
//!     }
//! })?;
//! scheduler.start();
//! ```

mod config;
mod error;
mod scheduler;
mod task;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use scheduler::TaskScheduler;
pub use task::TaskStatus;
