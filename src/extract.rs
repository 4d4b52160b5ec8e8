//! Extraction of stack trace structure from log files.
//!
//! Job logs often hold private data next to the traces operators need. The
//! extractor reads such files and prints only the structural parts of the
//! traces it recognises: frames, exception types, and (on request) the
//! exception messages. Python tracebacks and .NET unhandled-exception traces
//! are supported.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::category::DataCategory;
use crate::error::{Error, Result};
use crate::exception::{PublicError, PublicKind};
use crate::sink::SharedSink;

/// Default prefix of extracted lines; a `": "` separator follows it.
pub const DEFAULT_EXTRACT_PREFIX: &str = "SystemLog";

/// Extension of the files scanned when the input is a directory.
pub const ERR_EXTENSION: &str = "err";

static PY_TRACEBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Traceback \(most recent call last\):").expect("traceback regex should be valid")
});

static PY_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"File (?P<file>.*), line (?P<line>\d*), in (?P<method>.*)")
        .expect("frame regex should be valid")
});

static PY_EXCEPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<type>.*Error): (?P<message>.*)").expect("exception regex should be valid")
});

static DOTNET_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"at (?P<namespace>.*)\.(?P<class>.*)\.(?P<method>.*) in (?P<file>.*):line (?P<line>\d*)",
    )
    .expect(".NET frame regex should be valid")
});

static DOTNET_EXCEPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Unhandled exception. (?P<type>.*): (?P<message>.*)")
        .expect(".NET exception regex should be valid")
});

/// Prints the structure of the stack traces found in files.
///
/// # Examples
///
/// ```
/// use compliant_logging::{MemorySink, StackTraceExtractor};
/// use std::io::Write;
///
/// let mut file = tempfile::NamedTempFile::new().unwrap();
/// writeln!(file, "Traceback (most recent call last):").unwrap();
/// writeln!(file, "  File \"train.py\", line 4, in <module>").unwrap();
/// writeln!(file, "ValueError: alice,42").unwrap();
///
/// let output = MemorySink::new();
/// StackTraceExtractor::new().sink(output.clone()).extract(file.path()).unwrap();
///
/// let text = output.contents();
/// assert!(text.contains("SystemLog: type: ValueError"));
/// assert!(!text.contains("alice"));
/// ```
#[derive(Debug, Clone)]
pub struct StackTraceExtractor {
    show_exception_message: bool,
    prefix: String,
    sink: SharedSink,
}

impl Default for StackTraceExtractor {
    fn default() -> Self {
        Self {
            show_exception_message: false,
            prefix: DEFAULT_EXTRACT_PREFIX.to_string(),
            sink: SharedSink::stdout(),
        }
    }
}

/// Per-file parser state.
#[derive(Debug, Default)]
struct ParseState {
    in_python_traceback: bool,
}

impl StackTraceExtractor {
    /// Extractor printing to stdout without exception messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also prints exception messages when `true`.
    pub fn show_exception_message(mut self, show: bool) -> Self {
        self.show_exception_message = show;
        self
    }

    /// Sets the prefix of extracted lines.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the output sink.
    pub fn sink(mut self, sink: impl Into<SharedSink>) -> Self {
        self.sink = sink.into();
        self
    }

    /// Extracts traces from a file, or from every `*.err` file directly
    /// inside a directory. Hidden files are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::Extract`] with a `PublicValueError` if `path` is neither a
    /// file nor a directory, or a `PublicIOError` if an input cannot be
    /// read. [`Error::Sink`] if the output cannot be written.
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<()> {
        let result = self
            .input_files(path.as_ref())
            .and_then(|files| files.iter().try_for_each(|file| self.parse_file(file)));
        if let Err(Error::Extract(_)) = &result {
            self.emit([format!(
                "{}: There is a problem with the stack trace extractor.",
                self.prefix
            )])?;
        }
        result
    }

    fn input_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            self.emit([format!("{}: Input is a file", self.prefix)])?;
            return Ok(vec![path.to_path_buf()]);
        }
        if !path.is_dir() {
            return Err(Error::Extract(PublicError::value(
                "Provided path is neither a file nor a directory",
            )));
        }
        self.emit([format!("{}: Input is a directory", self.prefix)])?;

        let entries = fs::read_dir(path).map_err(|_| unreadable(path))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_err_file(p))
            .collect();
        files.sort();
        Ok(files)
    }

    fn parse_file(&self, file: &Path) -> Result<()> {
        let shown = fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
        let contents = fs::read_to_string(file).map_err(|_| unreadable(file))?;
        debug!(category = %DataCategory::Public, lines = contents.lines().count(), "parsing trace file");

        let mut lines = vec![format!("{}: Parsing file {}", self.prefix, shown.display())];
        let mut state = ParseState::default();
        for line in contents.lines() {
            self.parse_line(line, &mut state, &mut lines);
        }
        self.emit(lines)
    }

    fn parse_line(&self, line: &str, state: &mut ParseState, out: &mut Vec<String>) {
        if let Some(caps) = DOTNET_EXCEPTION.captures(line) {
            self.push_exception(&caps, out);
            return;
        }
        if let Some(caps) = DOTNET_FRAME.captures(line) {
            for key in ["namespace", "class", "method", "file", "line"] {
                self.push_group(&caps, key, out);
            }
            out.push(String::new());
            return;
        }

        if PY_TRACEBACK.is_match(line) {
            state.in_python_traceback = true;
        } else if let Some(caps) = PY_FRAME.captures(line) {
            for key in ["file", "line", "method"] {
                self.push_group(&caps, key, out);
            }
        } else if state.in_python_traceback {
            if let Some(caps) = PY_EXCEPTION.captures(line) {
                state.in_python_traceback = false;
                self.push_exception(&caps, out);
                if self.show_exception_message {
                    out.push(String::new());
                }
            }
        }
    }

    fn push_exception(&self, caps: &Captures<'_>, out: &mut Vec<String>) {
        self.push_group(caps, "type", out);
        if self.show_exception_message {
            self.push_group(caps, "message", out);
        }
    }

    fn push_group(&self, caps: &Captures<'_>, key: &str, out: &mut Vec<String>) {
        let value = caps.name(key).map_or("", |m| m.as_str());
        out.push(format!("{}: {}: {}", self.prefix, key, value));
    }

    fn emit<I>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        self.sink.write_lines(lines).map_err(Error::Sink)
    }
}

fn is_err_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    !hidden && path.extension().is_some_and(|ext| ext == ERR_EXTENSION)
}

fn unreadable(path: &Path) -> Error {
    Error::Extract(PublicError::new(
        PublicKind::Io,
        format!("Could not read {}", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySink;
    use std::io::Write;

    const PYTHON_TRACE: &str = "\
some private preamble: alice,42
Traceback (most recent call last):
  File \"/mnt/job/train.py\", line 12, in <module>
    main()
  File \"/mnt/job/train.py\", line 8, in main
    load(\"bob.csv\")
FileNotFoundError: [Errno 2] No such file or directory: 'bob.csv'
";

    const DOTNET_TRACE: &str = "\
Unhandled exception. System.ArgumentNullException: Value cannot be null. (Parameter 'customer')
   at Contoso.Billing.Invoice.Render(String customer) in C:\\src\\Invoice.cs:line 41
";

    fn run(contents: &str, show: bool) -> Vec<String> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let output = MemorySink::new();
        StackTraceExtractor::new()
            .show_exception_message(show)
            .sink(output.clone())
            .extract(file.path())
            .unwrap();
        output.lines()
    }

    #[test]
    fn python_trace_structure_is_extracted() {
        let lines = run(PYTHON_TRACE, false);

        assert_eq!(lines[0], "SystemLog: Input is a file");
        assert!(lines[1].starts_with("SystemLog: Parsing file "));
        assert_eq!(
            &lines[2..],
            &[
                "SystemLog: file: \"/mnt/job/train.py\"",
                "SystemLog: line: 12",
                "SystemLog: method: <module>",
                "SystemLog: file: \"/mnt/job/train.py\"",
                "SystemLog: line: 8",
                "SystemLog: method: main",
                "SystemLog: type: FileNotFoundError",
            ]
        );
        assert!(!lines.iter().any(|l| l.contains("alice") || l.contains("bob")));
    }

    #[test]
    fn messages_are_shown_on_request() {
        let lines = run(PYTHON_TRACE, true);
        assert!(lines.contains(
            &"SystemLog: message: [Errno 2] No such file or directory: 'bob.csv'".to_string()
        ));
    }

    #[test]
    fn dotnet_trace_structure_is_extracted() {
        let lines = run(DOTNET_TRACE, false);
        assert_eq!(
            &lines[2..],
            &[
                "SystemLog: type: System.ArgumentNullException",
                "SystemLog: namespace: Contoso.Billing",
                "SystemLog: class: Invoice",
                "SystemLog: method: Render(String customer)",
                "SystemLog: file: C:\\src\\Invoice.cs",
                "SystemLog: line: 41",
                "",
            ]
        );
    }

    #[test]
    fn directory_scans_err_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.err"), PYTHON_TRACE).unwrap();
        fs::write(dir.path().join("b.log"), PYTHON_TRACE).unwrap();
        fs::write(dir.path().join(".hidden.err"), PYTHON_TRACE).unwrap();

        let output = MemorySink::new();
        StackTraceExtractor::new()
            .prefix("Public")
            .sink(output.clone())
            .extract(dir.path())
            .unwrap();

        let lines = output.lines();
        assert_eq!(lines[0], "Public: Input is a directory");
        let parsed = lines.iter().filter(|l| l.starts_with("Public: Parsing file")).count();
        assert_eq!(parsed, 1);
    }

    #[test]
    fn missing_path_is_a_public_value_error() {
        let output = MemorySink::new();
        let err = StackTraceExtractor::new()
            .sink(output.clone())
            .extract("/definitely/not/here")
            .unwrap_err();

        match err {
            Error::Extract(public) => {
                assert_eq!(public.kind(), PublicKind::Value);
                assert_eq!(public.message(), "Provided path is neither a file nor a directory");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(output.contents().contains("There is a problem"));
    }
}
