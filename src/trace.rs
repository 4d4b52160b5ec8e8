//! Reporting of failures as sanitized, line-prefixed traces.
//!
//! [`StackTrace`] is the boundary between user code and the shared log
//! stream. It catches errors and panics escaping a unit of work, sanitizes
//! them, prints the trace with every line prefixed, and hands the sanitized
//! error back so ordinary propagation still sees a failure.
//!
//! Three forms are offered over the same reporting path:
//!
//! - [`StackTrace::call`] runs a closure once
//! - [`StackTrace::wrap`] turns a function into a reporting function
//! - [`StackTrace::scope`] guards a block and reports on exit

use std::any::Any;
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use chrono::Local;
use tracing::{debug, warn};

use crate::allow_list::AllowList;
use crate::category::DataCategory;
use crate::error::{Error, Result};
use crate::exception::{ErrorGraph, ErrorNode, PublicKind, RaisedError, Scrubbable};
use crate::panic::{graph_from_payload, record_reported, take_current, CaptureGuard};
use crate::sanitizer::Sanitizer;
use crate::sink::SharedSink;

/// Environment variable that disables all wrapping when set to `1` or
/// `true`, so raw errors surface while debugging.
pub const DEBUG_ENV: &str = "COMPLIANT_LOGGING_DEBUG";

/// Message of the error reported when there is nothing to report.
pub const NO_ACTIVE_ERROR: &str = "No active error to report";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Returns `true` if [`DEBUG_ENV`] requests raw errors.
pub fn debug_mode() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false)
}

/// Sanitizing reporter for failures escaping a unit of work.
///
/// Every emitted line has the form `<prefix> <line>`, or
/// `<prefix> <YYYY-MM-DD HH:MM:SS> <line>` with timestamps enabled.
///
/// # Examples
///
/// ```
/// use compliant_logging::{MemorySink, PublicError, StackTrace};
///
/// let output = MemorySink::new();
/// let trace = StackTrace::new().sink(output.clone()).disable(false);
///
/// let result: compliant_logging::Result<()> =
///     trace.call(|| Err(PublicError::value("bad column count")));
///
/// assert!(result.is_err());
/// assert!(output
///     .lines()
///     .contains(&"SystemLog: PublicValueError: bad column count".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct StackTrace {
    sink: SharedSink,
    disable: bool,
    sanitizer: Sanitizer,
    prefix: String,
    add_timestamp: bool,
}

impl Default for StackTrace {
    fn default() -> Self {
        let sanitizer = Sanitizer::default();
        Self {
            sink: SharedSink::stderr(),
            disable: debug_mode(),
            prefix: sanitizer.get_prefix().to_string(),
            sanitizer,
            add_timestamp: false,
        }
    }
}

impl StackTrace {
    /// Reporter writing to stderr with the default prefix and scrub message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output sink.
    pub fn sink(mut self, sink: impl Into<SharedSink>) -> Self {
        self.sink = sink.into();
        self
    }

    /// Bypasses all wrapping when `true`.
    pub fn disable(mut self, disable: bool) -> Self {
        self.disable = disable;
        self
    }

    /// Sets the prefix of every emitted line and of every scrubbed message.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.sanitizer = self.sanitizer.prefix(self.prefix.clone());
        self
    }

    /// Sets the text replacing scrubbed messages.
    pub fn scrub_message(mut self, scrub_message: impl Into<String>) -> Self {
        self.sanitizer = self.sanitizer.scrub_message(scrub_message);
        self
    }

    /// Keeps messages instead of scrubbing them.
    pub fn keep_message(mut self, keep: bool) -> Self {
        self.sanitizer = self.sanitizer.keep_message(keep);
        self
    }

    /// Keeps the messages of errors matching `allow_list`.
    pub fn allow_list(mut self, allow_list: AllowList) -> Self {
        self.sanitizer = self.sanitizer.allow_list(allow_list);
        self
    }

    /// Inserts a local timestamp after the prefix of every line.
    pub fn add_timestamp(mut self, add_timestamp: bool) -> Self {
        self.add_timestamp = add_timestamp;
        self
    }

    /// Whether wrapping is bypassed.
    pub fn is_disabled(&self) -> bool {
        self.disable
    }

    /// Sanitizes `error`, writes its trace to the sink, and returns the
    /// sanitized error.
    ///
    /// With `None`, the panic in flight on this thread is reported; if there
    /// is none, a `PublicRuntimeError` saying so is reported instead.
    ///
    /// # Errors
    ///
    /// Always returns an error: [`Error::Raised`] after a successful report,
    /// or [`Error::Sink`] if the sink rejected the output.
    pub fn emit_and_reraise<T>(&self, error: Option<ErrorGraph>) -> Result<T> {
        let graph = error
            .or_else(take_current)
            .unwrap_or_else(|| {
                ErrorGraph::new(
                    ErrorNode::new(PublicKind::Runtime.type_name()).with_message(NO_ACTIVE_ERROR),
                )
            });
        let clean = self.sanitizer.sanitize(graph);
        let lines = self.format_trace(&clean);

        if let Err(err) = self.sink.write_lines(&lines) {
            warn!(category = %DataCategory::Public, "failed to write trace to sink");
            return Err(Error::Sink(err));
        }
        debug!(
            category = %DataCategory::Public,
            lines = lines.len(),
            type_name = clean[clean.root()].type_name(),
            "reported sanitized trace"
        );
        Err(Error::Raised(RaisedError::sanitized(clean)))
    }

    /// Captures and reports `error`.
    ///
    /// An error that a reporter already sanitized is returned without being
    /// printed again. Any other error, including [`Error::Raw`] and
    /// hand-built [`RaisedError`]s, is reported.
    ///
    /// # Errors
    ///
    /// Same as [`emit_and_reraise`](Self::emit_and_reraise).
    pub fn report<T, E>(&self, error: &E) -> Result<T>
    where
        E: Scrubbable + 'static,
    {
        if let Some(raised) = already_reported(error) {
            return Err(Error::Raised(raised));
        }
        self.emit_and_reraise(Some(ErrorGraph::capture(error)))
    }

    /// Renders a graph as it would be emitted, without sanitizing it.
    pub fn format_trace(&self, graph: &ErrorGraph) -> Vec<String> {
        let timestamp = self
            .add_timestamp
            .then(|| Local::now().format(TIMESTAMP_FORMAT).to_string());
        graph
            .render(Some(&self.prefix))
            .into_iter()
            .map(|line| match &timestamp {
                Some(ts) => format!("{} {} {}", self.prefix, ts, line),
                None => format!("{} {}", self.prefix, line),
            })
            .collect()
    }

    /// Runs `f`, reporting any error or panic it raises.
    ///
    /// A returned error is reported and comes back as [`Error::Raised`]. A
    /// panic is reported and unwinding resumes with the [`RaisedError`] as
    /// payload. When disabled, `f` runs unwrapped: errors come back
    /// unsanitized as [`Error::Raw`] and panics are untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Raised`] when `f` fails, [`Error::Sink`] when the report
    /// could not be written.
    pub fn call<T, E, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Scrubbable + 'static,
    {
        if self.disable {
            return f().map_err(|error| raw(&error));
        }

        let outcome = {
            let _guard = CaptureGuard::enter();
            panic::catch_unwind(AssertUnwindSafe(f))
        };
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => self.report(&error),
            Err(payload) => match graph_from_payload(payload) {
                Ok(graph) => match self.emit_and_reraise(Some(graph)) {
                    Err(Error::Raised(raised)) => panic::resume_unwind(Box::new(raised)),
                    other => other,
                },
                Err(raised) => panic::resume_unwind(raised),
            },
        }
    }

    /// Wraps `f` so every call goes through [`call`](Self::call).
    ///
    /// Functions of several arguments take them as a tuple.
    pub fn wrap<A, T, E, F>(&self, f: F) -> impl Fn(A) -> Result<T>
    where
        F: Fn(A) -> std::result::Result<T, E>,
        E: Scrubbable + 'static,
    {
        let trace = self.clone();
        move |args| trace.call(|| f(args))
    }

    /// Opens a reporting scope.
    ///
    /// Finish the scope with [`TraceScope::exit`] to report a returned
    /// error. A panic unwinding through the scope is reported when the
    /// scope is dropped. The panic keeps unwinding with its original
    /// payload; an enclosing [`call`](Self::call) resumes it with the
    /// sanitized error instead, and other catchers can swap it with
    /// [`sanitized_payload`](crate::sanitized_payload).
    pub fn scope(&self) -> TraceScope<'_> {
        TraceScope {
            trace: self,
            guard: (!self.disable).then(CaptureGuard::enter),
            finished: false,
        }
    }
}

/// Guard returned by [`StackTrace::scope`].
#[derive(Debug)]
#[must_use = "a scope reports nothing unless it is held until the end of the block"]
pub struct TraceScope<'a> {
    trace: &'a StackTrace,
    guard: Option<CaptureGuard>,
    finished: bool,
}

impl TraceScope<'_> {
    /// Closes the scope, reporting `result` if it is an error.
    ///
    /// # Errors
    ///
    /// Same as [`StackTrace::call`].
    pub fn exit<T, E>(mut self, result: std::result::Result<T, E>) -> Result<T>
    where
        E: Scrubbable + 'static,
    {
        self.finished = true;
        drop(self.guard.take());
        match result {
            Ok(value) => Ok(value),
            Err(error) if self.trace.disable => Err(raw(&error)),
            Err(error) => self.trace.report(&error),
        }
    }
}

impl Drop for TraceScope<'_> {
    fn drop(&mut self) {
        if self.finished || self.trace.disable || !thread::panicking() {
            return;
        }
        if let Some(graph) = take_current() {
            // The unwinding payload cannot be replaced from here; whoever
            // catches the panic picks up the sanitized error instead.
            if let Err(Error::Raised(raised)) = self.trace.emit_and_reraise::<()>(Some(graph)) {
                record_reported(raised);
            }
        }
    }
}

fn already_reported(error: &dyn Any) -> Option<RaisedError> {
    error
        .downcast_ref::<RaisedError>()
        .or_else(|| error.downcast_ref::<Error>().and_then(Error::raised))
        .filter(|raised| raised.is_sanitized())
        .cloned()
}

/// Unsanitized pass-through used while disabled.
fn raw<E: Scrubbable + 'static>(error: &E) -> Error {
    if let Some(raised) = already_reported(error) {
        return Error::Raised(raised);
    }
    let any: &dyn Any = error;
    match any.downcast_ref::<Error>().and_then(Error::raw) {
        Some(raw) => Error::Raw(raw.clone()),
        None => Error::Raw(RaisedError::from_graph(ErrorGraph::capture(error))),
    }
}
