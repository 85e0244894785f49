//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (request ID, strict JSON bodies, record ids)
//!     → middleware/ (metrics → rate limit → authenticate → permission gate)
//!     → handlers/ (payload validation, store calls, versioned writes)
//!     → response.rs (JSON envelopes, error → status mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{JsonInput, RecordId, UuidRequestId, X_REQUEST_ID};
pub use response::{ApiError, JsonBody};
pub use server::{AppState, HttpServer};
