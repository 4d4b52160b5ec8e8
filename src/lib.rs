//! Compliant logging and exception scrubbing for eyes-off environments.
//!
//! Jobs running over private data must not leak that data into shared logs,
//! yet operators still need to see how a job failed. This crate provides:
//!
//! - **Category-aware logging**: every record is PUBLIC or PRIVATE. PUBLIC
//!   records carry a registered prefix (default `SystemLog:`), so
//!   downstream filters keep them and drop everything else.
//! - **Exception scrubbing**: errors escaping a unit of work are captured as
//!   a graph (cause and context links included, cycles tolerated), every
//!   field is scrubbed unless the error is allow-listed, and the trace is
//!   printed with each line prefixed.
//!
//! # Core Types
//!
//! - [`DataCategory`]: PUBLIC / PRIVATE marker of a log record
//! - [`CompliantLog`] / [`CompliantFormat`]: emitting and formatting records
//! - [`ErrorGraph`]: an error and everything reachable from it
//! - [`Sanitizer`]: the recursive scrubbing pass
//! - [`StackTrace`]: reporting wrapper around a unit of work
//! - [`PublicError`]: errors whose message is meant to be shown
//!
//! # Examples
//!
//! ```
//! use compliant_logging::{Exception, MemorySink, StackTrace};
//!
//! let output = MemorySink::new();
//! let trace = StackTrace::new().sink(output.clone()).disable(false);
//!
//! let result = trace.call(|| -> Result<(), Exception> {
//!     Err(Exception::new("KeyError", "customer alice@example.com"))
//! });
//!
//! let err = result.unwrap_err();
//! assert_eq!(err.to_string(), "SystemLog:**Exception message scrubbed**");
//! assert!(output
//!     .lines()
//!     .contains(&"SystemLog: KeyError: **Exception message scrubbed**".to_string()));
//! assert!(!output.contents().contains("alice"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod allow_list;
mod category;
mod error;
mod exception;
mod extract;
mod logging;
mod panic;
mod registry;
mod sanitizer;
mod sink;
mod trace;

pub use allow_list::{is_allowed, AllowList, DEFAULT_ALLOW_LIST};
pub use category::{DataCategory, UnknownCategory};
pub use error::{Error, Result};
pub use exception::{
    Access, ErrorGraph, ErrorNode, Exception, Field, FieldValue, Frame, Link, NodeId, PublicError,
    PublicKind, RaisedError, ReadOnlyField, Scrubbable, StdError, Value, CAUSE_HEADER,
    CONTEXT_HEADER, INTERNAL_FRAME_MARKER, MESSAGE_FIELD, TRACEBACK_HEADER,
};
pub use extract::{StackTraceExtractor, DEFAULT_EXTRACT_PREFIX, ERR_EXTENSION};
#[allow(deprecated)]
pub use logging::enable_confidential;
pub use logging::{
    enable, CompliantFormat, CompliantLog, LogFormat, LoggingConfig, DEFAULT_FORMAT, LOGGER_FIELD,
};
pub use panic::{sanitized_payload, PANIC_TYPE};
pub use registry::{get_prefix, set_prefix, PrefixRegistry};
pub use sanitizer::{Sanitizer, DEFAULT_PREFIX, DEFAULT_SCRUB_MESSAGE};
pub use sink::{MemorySink, SharedSink};
pub use trace::{debug_mode, StackTrace, TraceScope, DEBUG_ENV, NO_ACTIVE_ERROR};
