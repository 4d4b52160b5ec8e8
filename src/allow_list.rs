//! Decides whether an error's message is trusted enough to keep.

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};
use crate::exception::{ErrorNode, PublicKind};

/// Type names that are always allowed: the public error family.
pub const DEFAULT_ALLOW_LIST: [&str; 9] = [
    "PublicValueError",
    "PublicRuntimeError",
    "PublicArgumentError",
    "PublicKeyError",
    "PublicTypeError",
    "PublicIndexError",
    "PublicNotImplementedError",
    "PublicFileNotFoundError",
    "PublicIOError",
];

/// Patterns identifying errors whose message may be kept verbatim.
///
/// Each pattern is a case-insensitive regular expression searched for in
/// both the error's type name and its rendered message; a plain word
/// therefore behaves as a case-insensitive substring. The public error
/// family is always allowed on top of the caller's patterns. An empty
/// list trusts nothing beyond that family.
///
/// # Examples
///
/// ```
/// use compliant_logging::{AllowList, ErrorNode};
///
/// let allow = AllowList::new(["zerodivision"]).unwrap();
///
/// assert!(allow.is_allowed(&ErrorNode::new("ZeroDivisionError").with_message("x")));
/// assert!(!allow.is_allowed(&ErrorNode::new("KeyError").with_message("x")));
/// ```
#[derive(Debug, Clone)]
pub struct AllowList {
    patterns: Vec<Regex>,
}

impl AllowList {
    /// Compiles the caller's patterns followed by the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] for the first pattern that is not a valid
    /// regular expression.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            compiled.push(compile(pattern.as_ref())?);
        }
        compiled.extend(builtin());
        Ok(Self { patterns: compiled })
    }

    /// An allow-list holding only the built-in public error family.
    pub fn builtin_only() -> Self {
        Self {
            patterns: builtin().collect(),
        }
    }

    /// Number of patterns, built-ins included.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Always `false`: the built-ins are never absent.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `true` if any pattern matches the node's type name or
    /// message.
    pub fn is_allowed(&self, node: &ErrorNode) -> bool {
        let type_name = node.type_name();
        let message = node.message();
        self.patterns
            .iter()
            .any(|p| p.is_match(&message) || p.is_match(type_name))
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::builtin_only()
    }
}

/// Free-function form of [`AllowList::is_allowed`].
pub fn is_allowed(node: &ErrorNode, allow_list: &AllowList) -> bool {
    allow_list.is_allowed(node)
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| Error::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn builtin() -> impl Iterator<Item = Regex> {
    debug_assert_eq!(DEFAULT_ALLOW_LIST.len(), PublicKind::ALL.len());
    // Type names are plain identifiers, so escaping cannot fail.
    DEFAULT_ALLOW_LIST.into_iter().filter_map(|name| {
        RegexBuilder::new(&regex::escape(name))
            .case_insensitive(true)
            .build()
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_not_found() -> ErrorNode {
        ErrorNode::new("ModuleNotFoundError").with_message("Bingo. It is a pickle.")
    }

    #[test]
    fn matches_type_name() {
        let allow = AllowList::new(["argparse", "ModuleNotFound"]).unwrap();
        assert!(allow.is_allowed(&module_not_found()));
    }

    #[test]
    fn unrelated_patterns_do_not_match() {
        let allow = AllowList::new(["argparse", "type"]).unwrap();
        assert!(!allow.is_allowed(&module_not_found()));
    }

    #[test]
    fn regex_matches_message() {
        let allow = AllowList::new(["Bingo..+Pickle"]).unwrap();
        assert!(allow.is_allowed(&module_not_found()));
    }

    #[test]
    fn empty_list_trusts_nothing_else() {
        let allow = AllowList::new(Vec::<String>::new()).unwrap();
        assert!(!allow.is_allowed(&module_not_found()));
        assert_eq!(allow.len(), DEFAULT_ALLOW_LIST.len());
    }

    #[test]
    fn match_is_case_insensitive() {
        let allow = AllowList::new(["MODULENOTFOUNDERROR"]).unwrap();
        assert!(allow.is_allowed(&module_not_found()));
    }

    #[test]
    fn public_family_is_always_allowed() {
        let allow = AllowList::default();
        for kind in PublicKind::ALL {
            let node = ErrorNode::new(kind.type_name()).with_message("anything");
            assert!(is_allowed(&node, &allow), "{} should be allowed", kind);
        }
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = AllowList::new(["(unclosed"]).unwrap_err();
        assert!(matches!(err, Error::Pattern { ref pattern, .. } if pattern == "(unclosed"));
    }
}
