//! HTTP surface of the preview server.
//!
//! The service here implements the HttpService trait from galley_base, so it
//! runs unchanged against RealPal in production and MockPal in tests.

pub mod service;
pub mod sse;

pub use service::PreviewService;
pub use sse::{SseMessage, SseRegistry, SseStream};
