use std::borrow::Cow;
use std::io;

use thiserror::Error;

use crate::exception::{Field, Frame, Link, Scrubbable, StdError};
use crate::{PublicError, RaisedError};

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by this crate.
///
/// `Raised` is the normal outcome of a reported failure: the sanitized
/// error, handed back so the caller's own propagation and exit-code logic
/// still sees a failure. The other variants describe problems with the
/// reporting machinery itself; none of them carries user data.
#[derive(Debug, Error)]
pub enum Error {
    /// A failure was reported and re-raised.
    #[error(transparent)]
    Raised(RaisedError),

    /// A failure passed through a disabled reporter without being
    /// sanitized. Enabled reporters never trust it.
    #[error(transparent)]
    Raw(RaisedError),

    /// Writing the trace to the output sink failed.
    ///
    /// Not retried or masked, since losing diagnostic output silently is
    /// worse than failing loudly.
    #[error("failed to write to the output sink")]
    Sink(#[source] io::Error),

    /// An allow-list entry is not a valid regular expression.
    #[error("invalid allow-list pattern `{pattern}`")]
    Pattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        #[source]
        source: regex::Error,
    },

    /// A log format template names an unknown placeholder.
    #[error("unknown placeholder `{{{placeholder}}}` in log format")]
    Format {
        /// The placeholder name, without braces.
        placeholder: String,
    },

    /// Input to the stack trace extractor was rejected.
    #[error(transparent)]
    Extract(PublicError),

    /// The installed subscriber could not be reconfigured.
    #[error("failed to reconfigure logging")]
    Reload(#[source] tracing_subscriber::reload::Error),
}

impl Error {
    /// The re-raised error, if this is a reported failure.
    pub fn raised(&self) -> Option<&RaisedError> {
        match self {
            Error::Raised(raised) => Some(raised),
            _ => None,
        }
    }

    /// The unsanitized error, if this passed through a disabled reporter.
    pub fn raw(&self) -> Option<&RaisedError> {
        match self {
            Error::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    /// Consumes `self`, returning the re-raised error if there is one.
    pub fn into_raised(self) -> Option<RaisedError> {
        match self {
            Error::Raised(raised) => Some(raised),
            _ => None,
        }
    }
}

impl From<RaisedError> for Error {
    fn from(raised: RaisedError) -> Self {
        Error::Raised(raised)
    }
}

/// A reported or raw failure exposes its graph; the machinery errors
/// are viewed like any other `std::error::Error`.
impl Scrubbable for Error {
    fn type_name(&self) -> Cow<'_, str> {
        match self {
            Error::Raised(raised) | Error::Raw(raised) => Scrubbable::type_name(raised),
            Error::Extract(public) => Scrubbable::type_name(public),
            other => StdError(other).type_name().into_owned().into(),
        }
    }

    fn fields(&self) -> Vec<Field> {
        match self {
            Error::Raised(raised) | Error::Raw(raised) => raised.fields(),
            Error::Extract(public) => public.fields(),
            other => StdError(other).fields(),
        }
    }

    fn frames(&self) -> Vec<Frame> {
        match self {
            Error::Raised(raised) | Error::Raw(raised) => raised.frames(),
            Error::Extract(public) => public.frames(),
            _ => Vec::new(),
        }
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        match self {
            Error::Raised(raised) | Error::Raw(raised) => raised.links(visit),
            Error::Extract(_) => {}
            other => StdError(other).links(visit),
        }
    }

    fn identity(&self) -> usize {
        match self {
            Error::Raised(raised) | Error::Raw(raised) => Scrubbable::identity(raised),
            _ => (self as *const Error) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorGraph, ErrorNode};

    #[test]
    fn raised_display_is_transparent() {
        let raised = RaisedError::from_graph(ErrorGraph::new(
            ErrorNode::new("ValueError").with_message("SystemLog:**scrubbed**"),
        ));
        let err = Error::from(raised);

        assert_eq!(err.to_string(), "SystemLog:**scrubbed**");
        assert!(err.raised().unwrap().is_type("ValueError"));
    }

    #[test]
    fn machinery_errors_capture_with_variant_name() {
        let err = Error::Format {
            placeholder: "thread".to_string(),
        };
        let graph = ErrorGraph::capture(&err);
        assert_eq!(graph[graph.root()].type_name(), "Format");
    }

    #[test]
    fn raw_errors_capture_their_graph() {
        let raw = Error::Raw(RaisedError::from_graph(ErrorGraph::new(
            ErrorNode::new("KeyError").with_message("alice"),
        )));
        assert!(raw.raised().is_none());
        assert_eq!(raw.to_string(), "alice");

        let graph = ErrorGraph::capture(&raw);
        assert_eq!(graph[graph.root()].type_name(), "KeyError");
        assert_eq!(graph[graph.root()].message(), "alice");
    }

    #[test]
    fn format_error_names_placeholder() {
        let err = Error::Format {
            placeholder: "thread".to_string(),
        };
        assert_eq!(err.to_string(), "unknown placeholder `{thread}` in log format");
    }

    #[test]
    fn sink_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::Sink(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert!(err.source().is_some());
        assert!(err.into_raised().is_none());
    }
}
