//! Session tracking with sliding, inactivity-based expiry.
//!
//! This crate provides:
//! - [`SessionManager`], which issues unguessable session ids and tracks
//!   per-user conversational state across requests
//! - [`Session`], a snapshot of one session with arbitrary JSON attributes
//!
//! Sessions live in process memory only and are lost on restart.
//!
//! # Example
//!
//! ```rust,ignore
//! use confidant_session::{SessionConfig, SessionManager};
//!
//! let sessions = SessionManager::new(SessionConfig::default());
//! let session = sessions.create("user-1", None);
//!
//! // Activity is only recorded when the caller asks for it.
//! sessions.touch(&session.id)?;
//! ```

mod config;
mod error;
mod manager;
mod session;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use manager::{SessionManager, SessionStats};
pub use session::{Session, SessionSummary};
