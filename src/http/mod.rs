//! HTTP-to-RPC gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum, request id, access log, CORS)
//!     → [multiplex: application/grpc → tonic routes] (shared port only)
//!     → router.rs (method + path → typed handler)
//!     → request.rs (query string or JSON body → request message)
//!     → handler (in-process RPC call)
//!     → JSON reply, or response.rs (status → HTTP code + error envelope)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use request::{decode_request, X_REQUEST_ID};
pub use response::{http_status_from_code, CallError, ErrorEnvelope, ErrorTranslator};
pub use router::{GatewayRouter, RouteError};
pub use server::GatewayTranslator;
