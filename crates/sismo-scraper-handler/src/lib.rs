//! Invocation entry point for sismo-scraper.
//!
//! Turns a pipeline run into a `{status_code, headers, body}` response and
//! sets up logging for the binary.

pub mod handler;
pub mod logging;

pub use handler::{handle, invoke, InvocationResponse};
pub use logging::{init_tracing, LogFormat};
