//! Error graphs: the unit the sanitizer transforms.
//!
//! This module provides:
//! - `Scrubbable`: capability interface for introspecting an error's fields
//!   and links
//! - `ErrorGraph` / `ErrorNode`: arena holding an error and every error
//!   reachable through its cause and context links, cycles included
//! - `Field` / `Value`: the attributes of a node
//! - `Frame`: call-stack entries rendered in traces
//! - `PublicError` / `Exception`: concrete error types
//! - `RaisedError`: the error returned to callers after reporting

mod frame;
mod graph;
mod public;
mod raised;
mod scrubbable;
mod value;

pub use frame::{Frame, INTERNAL_FRAME_MARKER};
pub use graph::{ErrorGraph, ErrorNode, NodeId, CAUSE_HEADER, CONTEXT_HEADER, TRACEBACK_HEADER};
pub use public::{Exception, PublicError, PublicKind};
pub use raised::RaisedError;
pub use scrubbable::{Link, Scrubbable, StdError};
pub use value::{Access, Field, FieldValue, ReadOnlyField, Value, MESSAGE_FIELD};
