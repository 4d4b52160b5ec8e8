//! Call frames attached to error nodes.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;

/// Function paths containing this marker belong to the invocation
/// wrappers and are hidden from rendered traces.
pub const INTERNAL_FRAME_MARKER: &str = "compliant_logging::trace::";

/// One entry of a call stack: file, line, and (when known) function.
///
/// Frames are structural information and are never scrubbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    file: String,
    line: u32,
    function: Option<String>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(file: impl Into<String>, line: u32, function: Option<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function,
        }
    }

    /// Frame for the caller of a `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    /// Frame for a source location with no function name.
    pub fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), None)
    }

    /// Source file path.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// One-based line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Function path, if known.
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// `true` for frames of this crate's wrapper functions.
    pub fn is_internal(&self) -> bool {
        self.function
            .as_deref()
            .is_some_and(|f| f.contains(INTERNAL_FRAME_MARKER))
    }

    /// Parses a captured backtrace into frames, outermost first.
    ///
    /// Returns an empty list when the backtrace was not captured. Symbols
    /// without a source location are skipped.
    pub fn from_backtrace(backtrace: &Backtrace) -> Vec<Frame> {
        if backtrace.status() != BacktraceStatus::Captured {
            return Vec::new();
        }
        parse_backtrace(&backtrace.to_string())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  File \"{}\", line {}, in {}",
            self.file,
            self.line,
            self.function.as_deref().unwrap_or("<unknown>")
        )
    }
}

/// Parses the std backtrace display format:
///
/// ```text
///    3: my_crate::load
///              at ./src/main.rs:12:5
/// ```
fn parse_backtrace(rendered: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut symbol: Option<String> = None;

    for line in rendered.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            let Some(function) = symbol.take() else {
                continue;
            };
            if let Some((file, line_no)) = split_location(location) {
                frames.push(Frame::new(file, line_no, Some(function)));
            }
        } else if let Some((index, name)) = trimmed.split_once(": ") {
            if index.chars().all(|c| c.is_ascii_digit()) {
                symbol = Some(strip_hash(name).to_string());
            }
        }
    }

    // std prints innermost first; traces read outermost first.
    frames.reverse();
    frames
}

/// Splits `path:line:col` from the right so paths containing `:` survive.
fn split_location(location: &str) -> Option<(&str, u32)> {
    let mut parts = location.rsplitn(3, ':');
    let _column = parts.next()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?;
    Some((file, line))
}

/// Drops the trailing `::h0123abcd` disambiguator of legacy-mangled symbols.
fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}
