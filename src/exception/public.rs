//! Concrete error types: the public error family and a dynamic error.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt;

use super::{Field, Frame, Link, Scrubbable, Value, MESSAGE_FIELD};

/// Kinds of intentionally public errors.
///
/// Application code raises these to report a human-authored message that
/// is known to be free of private data. Their type names are always on the
/// allow-list, so the message survives sanitization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKind {
    /// An argument had an unacceptable value.
    Value,
    /// Generic runtime failure.
    Runtime,
    /// A command-line argument was rejected.
    Argument,
    /// A lookup key was missing.
    Key,
    /// A value had the wrong type.
    Type,
    /// An index was out of range.
    Index,
    /// The operation is not implemented.
    NotImplemented,
    /// A file did not exist.
    FileNotFound,
    /// An I/O operation failed.
    Io,
}

impl PublicKind {
    /// Every public kind.
    pub const ALL: [PublicKind; 9] = [
        PublicKind::Value,
        PublicKind::Runtime,
        PublicKind::Argument,
        PublicKind::Key,
        PublicKind::Type,
        PublicKind::Index,
        PublicKind::NotImplemented,
        PublicKind::FileNotFound,
        PublicKind::Io,
    ];

    /// Type name rendered in traces, e.g. `PublicValueError`.
    pub fn type_name(self) -> &'static str {
        match self {
            PublicKind::Value => "PublicValueError",
            PublicKind::Runtime => "PublicRuntimeError",
            PublicKind::Argument => "PublicArgumentError",
            PublicKind::Key => "PublicKeyError",
            PublicKind::Type => "PublicTypeError",
            PublicKind::Index => "PublicIndexError",
            PublicKind::NotImplemented => "PublicNotImplementedError",
            PublicKind::FileNotFound => "PublicFileNotFoundError",
            PublicKind::Io => "PublicIOError",
        }
    }

    /// Looks a kind up by its exact type name.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }
}

impl fmt::Display for PublicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// An error whose message is safe to show publicly.
///
/// # Examples
///
/// ```
/// use compliant_logging::{PublicError, PublicKind};
///
/// let err = PublicError::value("second argument cannot be zero");
/// assert_eq!(err.kind(), PublicKind::Value);
/// assert_eq!(err.to_string(), "second argument cannot be zero");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicError {
    kind: PublicKind,
    message: String,
    frame: Frame,
}

impl PublicError {
    /// Creates a public error raised at the caller's location.
    #[track_caller]
    pub fn new(kind: PublicKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            frame: Frame::caller(),
        }
    }

    /// Shorthand for [`PublicKind::Value`].
    #[track_caller]
    pub fn value(message: impl Into<String>) -> Self {
        Self::new(PublicKind::Value, message)
    }

    /// Shorthand for [`PublicKind::Runtime`].
    #[track_caller]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(PublicKind::Runtime, message)
    }

    /// Error kind.
    pub fn kind(&self) -> PublicKind {
        self.kind
    }

    /// The public message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where the error was raised.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl fmt::Display for PublicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PublicError {}

impl Scrubbable for PublicError {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.kind.type_name())
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::message(self.message.clone())]
    }

    fn frames(&self) -> Vec<Frame> {
        vec![self.frame.clone()]
    }
}

/// A dynamically shaped error with arbitrary named fields.
///
/// Useful for errors assembled at runtime, e.g. when bridging from a
/// foreign error representation, and for describing errors whose fields
/// include read-only or unreadable attributes.
///
/// # Examples
///
/// ```
/// use compliant_logging::{Exception, Field};
///
/// let err = Exception::new("KeyError", "customer_4411")
///     .with_field(Field::new("key", "customer_4411"))
///     .with_cause(Exception::new("LookupFailed", "table users"));
///
/// assert_eq!(err.type_name(), "KeyError");
/// assert_eq!(err.message(), "customer_4411");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    type_name: String,
    fields: Vec<Field>,
    frames: Vec<Frame>,
    cause: Option<Box<Exception>>,
    context: Option<Box<Exception>>,
}

impl Exception {
    /// Creates an error with a `message` field, raised at the caller's
    /// location.
    #[track_caller]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::bare(type_name).with_field(Field::message(message))
    }

    /// Creates an error with no fields, raised at the caller's location.
    #[track_caller]
    pub fn bare(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
            frames: vec![Frame::caller()],
            cause: None,
            context: None,
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Replaces the recorded frames.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Replaces the recorded frames with a parsed backtrace, if captured.
    pub fn with_backtrace(self, backtrace: &Backtrace) -> Self {
        let frames = Frame::from_backtrace(backtrace);
        if frames.is_empty() {
            self
        } else {
            self.with_frames(frames)
        }
    }

    /// Sets the error that directly caused this one.
    pub fn with_cause(mut self, cause: Exception) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Sets the error that was being handled when this one occurred.
    pub fn with_context(mut self, context: Exception) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Rendered `message` field, empty if there is none.
    pub fn message(&self) -> String {
        self.fields
            .iter()
            .find(|f| f.name() == MESSAGE_FIELD)
            .and_then(Field::value)
            .map(Value::to_string)
            .unwrap_or_default()
    }

    /// The direct cause, if any.
    pub fn cause(&self) -> Option<&Exception> {
        self.cause.as_deref()
    }

    /// The context, if any.
    pub fn context(&self) -> Option<&Exception> {
        self.context.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, message)
        }
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .or(self.context.as_deref())
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Scrubbable for Exception {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.type_name)
    }

    fn fields(&self) -> Vec<Field> {
        self.fields.clone()
    }

    fn frames(&self) -> Vec<Frame> {
        self.frames.clone()
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        if let Some(cause) = &self.cause {
            visit(Link::Cause, cause.as_ref());
        }
        if let Some(context) = &self.context {
            visit(Link::Context, context.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_type_names_round_trip() {
        for kind in PublicKind::ALL {
            assert_eq!(PublicKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(PublicKind::from_type_name("ValueError"), None);
    }

    #[test]
    fn public_error_records_caller_frame() {
        let err = PublicError::runtime("job failed");
        assert!(err.frame().file().ends_with("public.rs"));
        assert_eq!(err.frames().len(), 1);
    }

    #[test]
    fn exception_display_includes_type() {
        assert_eq!(
            Exception::new("ValueError", "bad").to_string(),
            "ValueError: bad"
        );
        assert_eq!(Exception::bare("AssertionError").to_string(), "AssertionError");
    }

    #[test]
    fn exception_links_visit_cause_then_context() {
        let err = Exception::new("B", "b")
            .with_cause(Exception::new("A", "a"))
            .with_context(Exception::new("C", "c"));

        let mut order = Vec::new();
        err.links(&mut |link, next| order.push((link, next.type_name().into_owned())));

        assert_eq!(
            order,
            vec![
                (Link::Cause, "A".to_string()),
                (Link::Context, "C".to_string())
            ]
        );
    }

    #[test]
    fn exception_source_prefers_cause() {
        use std::error::Error;

        let err = Exception::new("B", "b")
            .with_cause(Exception::new("A", "a"))
            .with_context(Exception::new("C", "c"));
        assert_eq!(err.source().unwrap().to_string(), "A: a");
    }
}
