use std::fmt;
use std::str::FromStr;

/// Data category attached to a single log call.
///
/// Categories are supplied explicitly at the call site and are never
/// inferred from the message. Records without a category are treated as
/// [`DataCategory::Private`]: if nobody vouched for the data, it is assumed
/// to be unsafe for a shared viewer.
///
/// With `tracing`, pass the category as a field named `category`:
///
/// ```
/// use compliant_logging::DataCategory;
///
/// tracing::warn!(category = %DataCategory::Public, "job started");
/// tracing::warn!("row contents: {}", "private");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataCategory {
    /// Safe to show to anyone with access to the shared log sink.
    Public,
    /// May contain private data. Rendered without the public prefix.
    #[default]
    Private,
}

impl DataCategory {
    /// Name of the tracing field the log formatter inspects.
    pub const FIELD: &'static str = "category";

    /// Returns `true` for [`DataCategory::Public`].
    pub fn is_public(self) -> bool {
        matches!(self, DataCategory::Public)
    }

    /// Resolves a raw field value into a category.
    ///
    /// Anything that is not recognisably `PUBLIC` resolves to `Private`.
    pub fn from_field(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataCategory::Public => write!(f, "PUBLIC"),
            DataCategory::Private => write!(f, "PRIVATE"),
        }
    }
}

/// Error returned when a string does not name a data category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory;

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown data category")
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for DataCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('"');
        if trimmed.eq_ignore_ascii_case("public") {
            Ok(DataCategory::Public)
        } else if trimmed.eq_ignore_ascii_case("private") {
            Ok(DataCategory::Private)
        } else {
            Err(UnknownCategory)
        }
    }
}
