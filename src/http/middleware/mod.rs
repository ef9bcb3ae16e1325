//! Gateway middleware.

pub mod cors;
pub mod multiplex;

pub use cors::{apply_cors_headers, cors_middleware};
pub use multiplex::{is_grpc, multiplex_middleware};
