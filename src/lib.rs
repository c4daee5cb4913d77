//! Minimal client for the Twitter streaming API.
//!
//! The crate is organized by concern:
//! - `client`: credentials, request URI construction, and the streaming call.
//! - `decode`: incremental JSON decoding of the response body.
//! - `status`: typed status messages handed to callbacks.
//! - `error`: the error type returned when a stream ends abnormally.

/// Streaming client and query parameter helpers.
pub mod client;
/// Incremental decoder for concatenated JSON values.
pub mod decode;
/// Stream error type.
pub mod error;
/// Status and user records.
pub mod status;

pub use client::{build_query_parameters, Client, ClientOptions, QueryParams};
pub use error::StreamError;
pub use status::{Status, User};
