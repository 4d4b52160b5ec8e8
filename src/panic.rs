//! Capture of in-flight panics.
//!
//! While a wrapper or scope is active on a thread, panics raised on that
//! thread are recorded silently instead of being printed by the default
//! hook: the wrapper reports them in sanitized form, and the default
//! message would leak the payload. Outside of wrappers the previously
//! installed hook runs unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic;
use std::sync::Once;

use crate::exception::{ErrorGraph, ErrorNode, Frame, RaisedError};

/// Type name given to captured panics.
pub const PANIC_TYPE: &str = "Panic";

static INSTALL: Once = Once::new();

thread_local! {
    static CAPTURE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CURRENT: RefCell<Option<ErrorNode>> = const { RefCell::new(None) };
    static REPORTED: RefCell<Option<RaisedError>> = const { RefCell::new(None) };
}

/// Installs the capturing hook once per process, chaining the current one.
pub(crate) fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURE_DEPTH.try_with(Cell::get).unwrap_or(0) == 0 {
                previous(info);
                return;
            }
            let mut node = ErrorNode::new(PANIC_TYPE).with_message(payload_message(info.payload()));
            let frames = user_frames(Frame::from_backtrace(&Backtrace::capture()));
            if frames.is_empty() {
                if let Some(location) = info.location() {
                    node = node.with_frame(Frame::from_location(location));
                }
            } else {
                for frame in frames {
                    node = node.with_frame(frame);
                }
            }
            let _ = CURRENT.try_with(|current| *current.borrow_mut() = Some(node));
            // A new panic supersedes whatever a scope reported before.
            let _ = REPORTED.try_with(|reported| reported.borrow_mut().take());
        }));
    });
}

/// Marks the current thread as capturing panics until dropped.
#[derive(Debug)]
pub(crate) struct CaptureGuard {
    _private: (),
}

impl CaptureGuard {
    pub(crate) fn enter() -> Self {
        install_hook();
        let outermost = CAPTURE_DEPTH.with(|depth| {
            depth.set(depth.get() + 1);
            depth.get() == 1
        });
        if outermost {
            // Anything left over was recorded by an earlier, already
            // finished capture.
            CURRENT.with(|current| current.borrow_mut().take());
            REPORTED.with(|reported| reported.borrow_mut().take());
        }
        Self { _private: () }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Takes the panic most recently recorded on this thread.
pub(crate) fn take_current() -> Option<ErrorGraph> {
    CURRENT
        .with(|current| current.borrow_mut().take())
        .map(ErrorGraph::new)
}

/// Keeps the sanitized form of the panic in flight, once a scope has
/// reported it.
pub(crate) fn record_reported(raised: RaisedError) {
    REPORTED.with(|reported| *reported.borrow_mut() = Some(raised));
}

fn take_reported() -> Option<RaisedError> {
    REPORTED.with(|reported| reported.borrow_mut().take())
}

/// Turns a caught panic payload into an error graph.
///
/// The `Err` variant carries a sanitized error that was already reported:
/// either the payload itself, resumed by an inner wrapper, or the error a
/// scope recorded while the panic unwound through it.
pub(crate) fn graph_from_payload(
    payload: Box<dyn Any + Send>,
) -> Result<ErrorGraph, Box<RaisedError>> {
    let payload = match payload.downcast::<RaisedError>() {
        Ok(raised) if raised.is_sanitized() => return Err(raised),
        Ok(raised) => {
            take_current();
            return Ok(ErrorGraph::capture(&*raised));
        }
        Err(other) => other,
    };
    if let Some(raised) = take_reported() {
        take_current();
        return Err(Box::new(raised));
    }
    match take_current() {
        Some(graph) => Ok(graph),
        None => Ok(ErrorGraph::new(
            ErrorNode::new(PANIC_TYPE).with_message(payload_message(payload.as_ref())),
        )),
    }
}

/// Swaps the payload of a panic caught after unwinding through a
/// [`TraceScope`](crate::TraceScope) for the sanitized error the scope
/// reported.
///
/// A scope cannot replace the payload of a panic in flight, so code that
/// catches panics around a bare scope calls this before inspecting or
/// resuming the payload. Other payloads are returned unchanged.
///
/// # Examples
///
/// ```
/// use std::panic::{self, AssertUnwindSafe};
/// use compliant_logging::{sanitized_payload, MemorySink, RaisedError, StackTrace};
///
/// let trace = StackTrace::new().sink(MemorySink::new()).disable(false);
/// let payload = panic::catch_unwind(AssertUnwindSafe(|| {
///     let _scope = trace.scope();
///     panic!("row 7: alice");
/// }))
/// .unwrap_err();
///
/// let raised = sanitized_payload(payload).downcast::<RaisedError>().unwrap();
/// assert!(raised.is_type("Panic"));
/// assert!(!raised.to_string().contains("alice"));
/// ```
pub fn sanitized_payload(payload: Box<dyn Any + Send>) -> Box<dyn Any + Send> {
    if payload.is::<RaisedError>() {
        return payload;
    }
    match take_reported() {
        Some(raised) => Box::new(raised),
        None => payload,
    }
}

/// Renders a panic payload the way the default hook does.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(raised) = payload.downcast_ref::<RaisedError>() {
        raised.to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}

const RUNTIME_PREFIXES: [&str; 10] = [
    "std::",
    "core::",
    "alloc::",
    "test::",
    "fn(",
    "__rust",
    "rust_begin_unwind",
    "_start",
    "__libc_start",
    "compliant_logging::panic::",
];

/// Drops frames of the runtime, the test harness and the panic machinery
/// itself.
fn user_frames(frames: Vec<Frame>) -> Vec<Frame> {
    frames
        .into_iter()
        .filter(|frame| match frame.function() {
            Some(function) => {
                let subject = self_type(function);
                function != "main"
                    && !RUNTIME_PREFIXES
                        .iter()
                        .any(|prefix| subject.starts_with(prefix))
            }
            None => false,
        })
        .collect()
}

/// The implementing type of a qualified path such as
/// `<alloc::boxed::Box<F> as core::ops::FnOnce<A>>::call_once`; other
/// symbols are returned unchanged.
fn self_type(function: &str) -> &str {
    match function.strip_prefix('<') {
        Some(rest) => rest.split_once(" as ").map_or(rest, |(subject, _)| subject),
        None => function,
    }
}
