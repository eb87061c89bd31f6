//! Xenia HTTP Capture
//!
//! The HTTP-facing edge of the Xenia activity log: an `axum` middleware
//! that records one sanitized [`xenia_audit::ActivityEntry`] per
//! request/response cycle and submits it to the batching pipeline. The
//! host application owns routing, auth and serving; this crate only
//! observes.
//!
//! # Overview
//!
//! [`record_activity`] buffers the request body, restores it for the
//! inner handler, runs the handler, buffers and restores the response
//! body, then derives the entry: action from the HTTP method (with a
//! booking-route override), outcome from the status code, client IP
//! from forwarding headers, resource from the path, latency into
//! metadata. Identity comes from [`AuthIdentity`] in the request or
//! response extensions when the host's auth layer provides it.
//! Recording never alters the response.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::routing::get;
//! use axum::{middleware, Router};
//! use xenia_http::{record_activity, CaptureContext};
//! use xenia_pipeline::{ActivityLogService, PipelineConfig};
//! use xenia_store::{ActivityStore, MemoryStore};
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new()) as Arc<dyn ActivityStore>;
//! let service = Arc::new(ActivityLogService::new(store, PipelineConfig::default()));
//!
//! let app: Router = Router::new()
//!     .route("/api/rooms", get(|| async { "ok" }))
//!     .layer(middleware::from_fn_with_state(
//!         CaptureContext::new(service),
//!         record_activity,
//!     ));
//! # let _ = app;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow some clippy lints for initial development - will tighten before release
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod capture;
pub mod client_ip;

// Re-export main types at crate root
pub use capture::{
    record_activity, AuthIdentity, CaptureConfig, CaptureContext, MAX_REQUEST_ID_LEN,
    REQUEST_ID_HEADER, SESSION_ID_HEADER,
};
pub use client_ip::client_ip;
