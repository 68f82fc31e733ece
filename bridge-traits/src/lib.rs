//! # Host Bridge Traits
//!
//! Platform abstraction traits implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the Drive transporter and the
//! environment it runs in. Each trait is a capability the core needs but that
//! is provided differently on desktop, in tests, or in an embedding host.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single round-trip async HTTP
//!
//! ### Credentials
//! - [`SecureStore`](storage::SecureStore) - Token cache persistence
//! - [`AuthorizationCodeReceiver`](auth::AuthorizationCodeReceiver) - OAuth consent redirect
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Implementations
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Tests    | `mockall` mocks and in-memory fakes |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with actionable messages, without
//! embedding secrets.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! behind an `Arc` across tasks.

pub mod auth;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use auth::{AuthorizationCallback, AuthorizationCodeReceiver};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::SecureStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
