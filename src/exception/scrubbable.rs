//! The capability interface through which errors are introspected.

use std::borrow::Cow;
use std::error::Error as StdErrorTrait;
use std::io;

use super::{Field, Frame};

/// Relationship between an error and a linked error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The linked error directly caused this one.
    Cause,
    /// The linked error was being handled when this one occurred.
    Context,
}

/// An error whose structure can be captured for sanitization.
///
/// Implementations expose every readable field, including ones that hold
/// private data; the sanitizer decides what survives. Fields that are
/// advertised but cannot be produced should be reported with
/// [`Field::unreadable`], and immutable ones with [`Field::read_only`].
///
/// # Examples
///
/// ```
/// use std::borrow::Cow;
/// use compliant_logging::{ErrorGraph, Field, Scrubbable};
///
/// struct RowRejected {
///     row: String,
///     line: i64,
/// }
///
/// impl Scrubbable for RowRejected {
///     fn type_name(&self) -> Cow<'_, str> {
///         Cow::Borrowed("RowRejected")
///     }
///
///     fn fields(&self) -> Vec<Field> {
///         vec![
///             Field::message(format!("bad row: {}", self.row)),
///             Field::new("line", self.line),
///         ]
///     }
/// }
///
/// let graph = ErrorGraph::capture(&RowRejected { row: "alice,42".into(), line: 3 });
/// assert_eq!(graph[graph.root()].type_name(), "RowRejected");
/// ```
pub trait Scrubbable {
    /// Name of the error type as it should appear in traces.
    fn type_name(&self) -> Cow<'_, str>;

    /// Every field of the error, in a stable order.
    fn fields(&self) -> Vec<Field>;

    /// Call frames recorded for the error, outermost first.
    fn frames(&self) -> Vec<Frame> {
        Vec::new()
    }

    /// Calls `visit` for the cause and context of this error, if any.
    fn links(&self, _visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {}

    /// Identity used to detect cycles while capturing. Defaults to the
    /// object's address, which is only compared against errors still on
    /// the capture path.
    fn identity(&self) -> usize {
        (self as *const Self).cast::<()>() as usize
    }
}

/// Fallback view over any [`std::error::Error`].
///
/// Exposes only the type name and the rendered message, and follows
/// [`source`](std::error::Error::source) as the cause chain. The type name
/// is read from the leading identifier of the error's `Debug` output,
/// which is the type or variant name for derived implementations; errors
/// whose `Debug` output does not start with one are named `Error`.
#[derive(Clone, Copy)]
pub struct StdError<'a>(pub &'a (dyn StdErrorTrait + 'static));

impl Scrubbable for StdError<'_> {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Owned(debug_type_name(self.0))
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::message(self.0.to_string())]
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        if let Some(source) = self.0.source() {
            visit(Link::Cause, &StdError(source));
        }
    }

    fn identity(&self) -> usize {
        (self.0 as *const dyn StdErrorTrait).cast::<()>() as usize
    }
}

/// Leading type identifier of an error's `Debug` output.
pub(crate) fn debug_type_name(error: &dyn StdErrorTrait) -> String {
    let repr = format!("{:?}", error);
    let ident: String = repr
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let ident = ident.trim_end_matches(':');
    match ident.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => ident.to_string(),
        _ => "Error".to_string(),
    }
}

impl Scrubbable for io::Error {
    /// Named after the error kind, e.g. `NotFoundError`.
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{:?}Error", self.kind()))
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::message(self.to_string())];
        if let Some(code) = self.raw_os_error() {
            fields.push(Field::new("errno", i64::from(code)));
        }
        fields.push(Field::new(
            "kind",
            super::Value::Opaque(format!("{:?}", self.kind())),
        ));
        fields
    }

    /// The wrapped payload of a custom I/O error renders as the error
    /// itself, so the chain starts at the payload's own source.
    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        if let Some(source) = self.get_ref().and_then(|inner| inner.source()) {
            visit(Link::Cause, &StdError(source));
        }
    }
}

impl Scrubbable for Box<dyn StdErrorTrait + Send + Sync + 'static> {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Owned(debug_type_name(&**self))
    }

    fn fields(&self) -> Vec<Field> {
        StdError(&**self).fields()
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        StdError(&**self).links(visit);
    }

    fn identity(&self) -> usize {
        StdError(&**self).identity()
    }
}

impl Scrubbable for Box<dyn StdErrorTrait + 'static> {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Owned(debug_type_name(&**self))
    }

    fn fields(&self) -> Vec<Field> {
        StdError(&**self).fields()
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        StdError(&**self).links(visit);
    }

    fn identity(&self) -> usize {
        StdError(&**self).identity()
    }
}
