//! Category-aware logging on top of `tracing`.
//!
//! Every record carries a `category` field. [`CompliantFormat`] resolves it
//! per record: PUBLIC records are rendered with the registered prefix,
//! everything else (PRIVATE, or no category at all) with an empty one, so
//! downstream filters can drop unprefixed lines.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{debug, Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::{reload, Layer};

use crate::category::DataCategory;
use crate::error::{Error, Result};
use crate::registry::{self, PrefixRegistry};
use crate::sanitizer::DEFAULT_PREFIX;

/// Default record layout.
pub const DEFAULT_FORMAT: &str = "{prefix}{level}:{name}:{message}";

/// Field naming the logger that emitted a record.
pub const LOGGER_FIELD: &str = "logger";

const BANNER_RULE: &str =
    "********************************************************************************";

const ALREADY_CONFIGURED: [&str; 4] = [
    "A different global tracing subscriber is already installed! As a result,",
    "records are formatted by that subscriber and the category prefix is only",
    "applied if it uses CompliantFormat. The registered prefix has been updated",
    "regardless, so stack traces and CompliantFormat-based subscribers use it.",
];

const DEPRECATED_ENTRY: [&str; 2] = [
    "enable_confidential is deprecated and will be removed in a future release.",
    "Call enable instead; it accepts the same configuration.",
];

/// A named logger whose records carry a data category.
///
/// Records are PRIVATE unless the logger, or the individual call, says
/// otherwise.
///
/// # Examples
///
/// ```no_run
/// use compliant_logging::{CompliantLog, DataCategory};
///
/// let log = CompliantLog::new("trainer");
/// log.info(format_args!("epoch {} done", 3));
/// log.public().info(format_args!("reached the evaluation step"));
/// log.log(tracing::Level::WARN, DataCategory::Public, format_args!("slow disk"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompliantLog {
    name: String,
    category: DataCategory,
}

impl CompliantLog {
    /// Creates a logger whose records default to PRIVATE.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: DataCategory::Private,
        }
    }

    /// A copy of this logger whose records are PUBLIC.
    pub fn public(&self) -> Self {
        self.with_category(DataCategory::Public)
    }

    /// A copy of this logger with the given default category.
    pub fn with_category(&self, category: DataCategory) -> Self {
        Self {
            name: self.name.clone(),
            category,
        }
    }

    /// Logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default category of this logger's records.
    pub fn category(&self) -> DataCategory {
        self.category
    }

    /// Logs an error-level record.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::ERROR, self.category, args);
    }

    /// Logs a warning-level record.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::WARN, self.category, args);
    }

    /// Logs an info-level record.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::INFO, self.category, args);
    }

    /// Logs a debug-level record.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::DEBUG, self.category, args);
    }

    /// Logs a trace-level record.
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::TRACE, self.category, args);
    }

    /// Logs a record with an explicit level and category.
    pub fn log(&self, level: Level, category: DataCategory, args: fmt::Arguments<'_>) {
        let name = self.name.as_str();
        macro_rules! emit {
            ($level:expr) => {
                tracing::event!($level, category = %category, logger = name, "{}", args)
            };
        }
        if level == Level::ERROR {
            emit!(Level::ERROR);
        } else if level == Level::WARN {
            emit!(Level::WARN);
        } else if level == Level::INFO {
            emit!(Level::INFO);
        } else if level == Level::DEBUG {
            emit!(Level::DEBUG);
        } else {
            emit!(Level::TRACE);
        }
    }
}

/// One piece of a parsed format template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Prefix,
    Level,
    Name,
    Message,
    Fields,
}

/// A parsed record layout.
///
/// Placeholders: `{prefix}`, `{level}`, `{name}`, `{message}`, `{fields}`.
/// A `{` without a matching `}` is literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFormat {
    segments: Vec<Segment>,
}

impl LogFormat {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for an unknown placeholder.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            literal.push_str(&rest[..start]);
            let name = &rest[start + 1..start + len];
            let segment = match name {
                "prefix" => Segment::Prefix,
                "level" => Segment::Level,
                "name" => Segment::Name,
                "message" => Segment::Message,
                "fields" => Segment::Fields,
                other => {
                    return Err(Error::Format {
                        placeholder: other.to_string(),
                    })
                }
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            rest = &rest[start + len + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        Self {
            segments: vec![
                Segment::Prefix,
                Segment::Level,
                Segment::Literal(":".to_string()),
                Segment::Name,
                Segment::Literal(":".to_string()),
                Segment::Message,
            ],
        }
    }
}

/// Event formatter resolving the category prefix of every record.
///
/// # Examples
///
/// ```
/// use compliant_logging::{CompliantFormat, DataCategory, MemorySink, PrefixRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(PrefixRegistry::new());
/// registry.set("SystemLog:");
/// let output = MemorySink::new();
/// let subscriber = tracing_subscriber::fmt()
///     .with_writer(output.clone())
///     .event_format(CompliantFormat::default().with_registry(registry))
///     .finish();
///
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::warn!(category = %DataCategory::Public, "public news");
///     tracing::warn!("private news");
/// });
///
/// let lines = output.lines();
/// assert!(lines[0].starts_with("SystemLog:WARN:"));
/// assert!(lines[1].starts_with("WARN:"));
/// ```
#[derive(Debug, Clone)]
pub struct CompliantFormat {
    format: LogFormat,
    registry: Arc<PrefixRegistry>,
}

impl Default for CompliantFormat {
    fn default() -> Self {
        Self::new(LogFormat::default())
    }
}

impl CompliantFormat {
    /// Formatter reading the process-wide prefix.
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            registry: Arc::clone(registry::global()),
        }
    }

    /// Reads the prefix from `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<PrefixRegistry>) -> Self {
        self.registry = registry;
        self
    }

    fn prefix(&self, category: DataCategory) -> Arc<str> {
        if category.is_public() {
            self.registry.get().unwrap_or_else(|| Arc::from(""))
        } else {
            Arc::from("")
        }
    }
}

impl<S, N> FormatEvent<S, N> for CompliantFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut record = RecordVisitor::default();
        event.record(&mut record);

        let metadata = event.metadata();
        let prefix = self.prefix(record.category);
        let name = record.logger.as_deref().unwrap_or_else(|| metadata.target());

        for segment in &self.format.segments {
            match segment {
                Segment::Literal(text) => writer.write_str(text)?,
                Segment::Prefix => writer.write_str(&prefix)?,
                Segment::Level => write!(writer, "{}", metadata.level())?,
                Segment::Name => writer.write_str(name)?,
                Segment::Message => writer.write_str(&record.message)?,
                Segment::Fields => writer.write_str(&record.fields.join(" "))?,
            }
        }
        writeln!(writer)
    }
}

/// Pulls the fields the formatter needs out of an event.
#[derive(Debug, Default)]
struct RecordVisitor {
    category: DataCategory,
    logger: Option<String>,
    message: String,
    fields: Vec<String>,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            DataCategory::FIELD => self.category = DataCategory::from_field(value),
            LOGGER_FIELD => self.logger = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.fields.push(format!("{}={}", name, value)),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }
}

/// Configuration for [`enable`].
pub struct LoggingConfig {
    prefix: String,
    format: String,
    level: Level,
    writer: BoxMakeWriter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            format: DEFAULT_FORMAT.to_string(),
            level: Level::WARN,
            writer: BoxMakeWriter::new(io::stderr),
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("prefix", &self.prefix)
            .field("format", &self.format)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl LoggingConfig {
    /// Default configuration: `SystemLog:` prefix, WARN and above, stderr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefix of PUBLIC records.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the record template.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets the most verbose level that is emitted.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets where records are written.
    pub fn writer<W>(mut self, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.writer = BoxMakeWriter::new(writer);
        self
    }

    /// The configured prefix.
    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }
}

type FilteredRegistry = Layered<reload::Layer<LevelFilter, Registry>, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Reload handles of the subscriber installed by [`enable`].
struct Installed {
    level: reload::Handle<LevelFilter, Registry>,
    output: reload::Handle<OutputLayer, FilteredRegistry>,
}

static INSTALLED: OnceLock<Installed> = OnceLock::new();

fn output_layer(format: LogFormat, writer: BoxMakeWriter) -> OutputLayer {
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .event_format(CompliantFormat::new(format))
        .boxed()
}

/// Installs category-aware logging for the whole process.
///
/// The prefix is registered first, so stack traces and formatters created
/// later pick it up even when installation itself is skipped. Calling
/// `enable` again reconfigures the subscriber it installed: the new
/// format, level and writer replace the old ones. If a different global
/// subscriber is already installed it cannot be replaced; a prefixed
/// warning banner is printed to stderr and the call still succeeds.
///
/// # Errors
///
/// Returns [`Error::Format`] if the template names an unknown placeholder,
/// and [`Error::Reload`] if the installed subscriber cannot be updated.
pub fn enable(config: LoggingConfig) -> Result<()> {
    let format = LogFormat::parse(&config.format)?;
    registry::set_prefix(config.prefix.as_str());
    let level = LevelFilter::from_level(config.level);
    let output = output_layer(format, config.writer);

    if let Some(installed) = INSTALLED.get() {
        installed.level.reload(level).map_err(Error::Reload)?;
        installed.output.reload(output).map_err(Error::Reload)?;
        debug!(category = %DataCategory::Public, %level, "logging reconfigured");
        return Ok(());
    }

    let (level, level_handle) = reload::Layer::new(level);
    let (output, output_handle) = reload::Layer::new(output);
    let subscriber = tracing_subscriber::registry().with(level).with(output);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // stderr is the last resort; a failure here has nowhere to go.
        let _ = write_banner(&mut io::stderr().lock(), &config.prefix, &ALREADY_CONFIGURED);
        return Ok(());
    }
    let _ = INSTALLED.set(Installed {
        level: level_handle,
        output: output_handle,
    });
    Ok(())
}

/// Deprecated entry point kept for existing callers.
///
/// # Errors
///
/// Same as [`enable`].
#[deprecated(note = "use `enable` instead")]
pub fn enable_confidential(config: LoggingConfig) -> Result<()> {
    let _ = write_banner(&mut io::stderr().lock(), &config.prefix, &DEPRECATED_ENTRY);
    enable(config)
}

fn write_banner(out: &mut dyn Write, prefix: &str, body: &[&str]) -> io::Result<()> {
    writeln!(out, "{}{}", prefix, BANNER_RULE)?;
    for line in body {
        writeln!(out, "{}{}", prefix, line)?;
    }
    writeln!(out, "{}{}", prefix, BANNER_RULE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySink;

    fn capture(prefix: &str, template: &str, body: impl FnOnce()) -> Vec<String> {
        let registry = Arc::new(PrefixRegistry::new());
        registry.set(prefix);
        let output = MemorySink::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_writer(output.clone())
            .event_format(CompliantFormat::new(LogFormat::parse(template).unwrap()).with_registry(registry))
            .finish();
        tracing::subscriber::with_default(subscriber, body);
        output.lines()
    }

    #[test]
    fn public_records_get_prefix() {
        let lines = capture("SystemLog:", DEFAULT_FORMAT, || {
            CompliantLog::new("job").public().warn(format_args!("hello"));
        });
        assert_eq!(lines, vec!["SystemLog:WARN:job:hello"]);
    }

    #[test]
    fn private_and_unspecified_records_get_no_prefix() {
        let lines = capture("SystemLog:", DEFAULT_FORMAT, || {
            CompliantLog::new("job").info(format_args!("row {}", 4));
            tracing::error!("third party");
        });
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "INFO:job:row 4");
        assert!(lines[1].starts_with("ERROR:"));
        assert!(lines[1].ends_with(":third party"));
    }

    #[test]
    fn category_given_as_plain_string() {
        let lines = capture("P>", "{prefix}{message}", || {
            tracing::info!(category = "PUBLIC", "plain");
            tracing::info!(category = "public", "lowercase");
            tracing::info!(category = "bogus", "unknown");
        });
        assert_eq!(lines, vec!["P>plain", "P>lowercase", "unknown"]);
    }

    #[test]
    fn per_call_category_overrides_logger() {
        let lines = capture("SystemLog:", "{prefix}{message}", || {
            let log = CompliantLog::new("job").public();
            log.log(Level::INFO, DataCategory::Private, format_args!("secret"));
        });
        assert_eq!(lines, vec!["secret"]);
    }

    #[test]
    fn extra_fields_render_in_fields_placeholder() {
        let lines = capture("S:", "{prefix}{message} [{fields}]", || {
            tracing::warn!(category = %DataCategory::Public, epoch = 3, "done");
        });
        assert_eq!(lines, vec!["S:done [epoch=3]"]);
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = LogFormat::parse("{prefix}{thread}").unwrap_err();
        assert!(matches!(err, Error::Format { ref placeholder } if placeholder == "thread"));
    }

    #[test]
    fn unclosed_brace_is_literal() {
        let format = LogFormat::parse("{message} {oops").unwrap();
        assert_eq!(
            format.segments,
            vec![Segment::Message, Segment::Literal(" {oops".to_string())]
        );
    }

    #[test]
    fn default_format_matches_template() {
        assert_eq!(LogFormat::parse(DEFAULT_FORMAT).unwrap(), LogFormat::default());
    }

    #[test]
    fn banner_lines_are_prefixed() {
        let mut out = Vec::new();
        write_banner(&mut out, "SystemLog:", &ALREADY_CONFIGURED).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), ALREADY_CONFIGURED.len() + 2);
        assert!(text.lines().all(|l| l.starts_with("SystemLog:")));
        assert!(text.contains("already installed"));
    }
}
