//! # Veilform Client
//!
//! Access to the form storage service.
//!
//! The service is an opaque authenticated JSON-over-HTTPS store. It holds
//! envelopes and cleartext metadata only; every response has the shape
//! `{ data?: T, err?: string }` and a non-empty `err` is always a failure.
//!
//! ## Key Types
//!
//! - [`FormService`]: The operations a session needs from the service
//! - [`HttpFormService`]: `reqwest` implementation
//! - [`InMemoryFormService`]: In-memory implementation with call counters
//!   and failure injection

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod service;

// Re-exports
pub use api::{
    ApiResponse, Existence, FormSummary, LoginArgs, LoginResponse, ResponseSummary,
    SubmissionReceipt,
};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpFormService;
pub use memory::{InMemoryFormService, InjectedFailure};
pub use service::FormService;
