//! # Veilform Session
//!
//! Composition of one response to one form.
//!
//! A [`ResponseSession`] opens the form, restores a local draft, keeps the
//! draft current while the respondent types and submits the sealed response
//! at most once.
//!
//! ## Draft persistence
//!
//! Drafts are written on every answer change and by a timer
//! ([`AutosaveTask`]). A draft is restored before the timer is armed and is
//! deleted only after a successful submission. Snapshot failures are logged
//! and never block composing.
//!
//! ## Submission guard
//!
//! [`SubmissionGuard`] is an atomic `Idle -> InFlight -> {Submitted | Failed}`
//! state machine. Duplicate completion triggers are dropped; a failure keeps
//! the guard closed until the caller rearms it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use veilform_session::{Reader, ResponseSession, SessionConfig, Submission};
//!
//! let session = ResponseSession::start(form_id, Reader::new(keys, "0xabc"),
//!     service, drafts, SessionConfig::default()).await?;
//! session.set_answer("q1", serde_json::json!("yes")).await?;
//! if let Submission::Accepted(receipt) = session.complete().await? {
//!     println!("stored as {:?}", receipt.cid);
//! }
//! ```

pub mod autosave;
pub mod config;
pub mod error;
pub mod guard;
pub mod opening;
pub mod session;

// Re-exports
pub use autosave::{AutosaveHandle, AutosaveTask, DraftSnapshotter, MIN_AUTOSAVE_INTERVAL};
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use guard::{GuardState, SubmissionGuard, SubmissionTicket};
pub use opening::open_with_timeout;
pub use session::{Reader, ResponseSession, SessionMode, Submission};
