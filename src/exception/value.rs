//! Field values carried by error nodes.

use std::fmt;

/// A value stored in an error field.
///
/// The variants mirror the kinds of attribute the sanitizer distinguishes:
/// text is scrubbed or kept, sequences are rebuilt element-wise with their
/// kind preserved, callables are never touched, and everything else is
/// opaque.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Textual data. The most likely carrier of private payloads.
    Text(String),
    /// Ordered, growable sequence.
    List(Vec<Value>),
    /// Fixed-arity sequence, e.g. positional error arguments.
    Tuple(Vec<Value>),
    /// Integer scalar such as an errno.
    Integer(i64),
    /// Boolean flag.
    Bool(bool),
    /// A method or hook. Identified by name only.
    Callable(String),
    /// A value of a kind the sanitizer does not understand.
    ///
    /// The string is the value's rendered representation.
    Opaque(String),
    /// Explicit "no value".
    Absent,
}

impl Value {
    /// Convenience constructor for [`Value::Text`].
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Returns `true` for [`Value::Absent`].
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Returns the text of a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::List(items) | Value::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Integer(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Callable(name) => write!(f, "<callable {}>", name),
            Value::Opaque(repr) => f.write_str(repr),
            Value::Absent => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Whether a field can be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// The sanitizer may write a transformed value back.
    #[default]
    ReadWrite,
    /// Computed or otherwise immutable. A write attempt fails.
    ReadOnly,
}

/// The result of reading a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The field produced a value.
    Readable(Value),
    /// The field is advertised but reading it fails.
    Unreadable,
}

/// A named attribute of an error node.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    value: FieldValue,
    access: Access,
}

impl Field {
    /// Creates a writable field.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Readable(value.into()),
            access: Access::ReadWrite,
        }
    }

    /// Creates a field that rejects writes.
    pub fn read_only(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Readable(value.into()),
            access: Access::ReadOnly,
        }
    }

    /// Creates a field whose value cannot be produced.
    pub fn unreadable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Unreadable,
            access: Access::ReadOnly,
        }
    }

    /// Creates the conventional `message` field.
    pub fn message(text: impl Into<String>) -> Self {
        Self::new(MESSAGE_FIELD, Value::Text(text.into()))
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value, or `None` if the field is unreadable.
    pub fn value(&self) -> Option<&Value> {
        match &self.value {
            FieldValue::Readable(v) => Some(v),
            FieldValue::Unreadable => None,
        }
    }

    /// Field access mode.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Names starting with `__` are structural metadata, not data.
    pub fn is_dunder(&self) -> bool {
        self.name.starts_with("__")
    }

    /// Overwrites the value.
    ///
    /// Fails for read-only fields.
    pub(crate) fn try_set(&mut self, value: Value) -> Result<(), ReadOnlyField> {
        match self.access {
            Access::ReadWrite => {
                self.value = FieldValue::Readable(value);
                Ok(())
            }
            Access::ReadOnly => Err(ReadOnlyField),
        }
    }
}

/// Name of the field holding an error's message.
pub const MESSAGE_FIELD: &str = "message";

/// Write-back failure on a read-only field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOnlyField;

impl ReadOnlyField {
    /// Name used when reporting this failure.
    pub const NAME: &'static str = "ReadOnlyField";
}

impl fmt::Display for ReadOnlyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("field is read-only")
    }
}

impl std::error::Error for ReadOnlyField {}
