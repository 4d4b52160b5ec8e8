//! Recursive scrubbing of error graphs.
//!
//! The sanitizer walks an [`ErrorGraph`] from its root through every cause
//! and context link, rewriting each node's fields so that nothing private
//! survives. Each node is visited exactly once, which bounds the walk on
//! self-referencing and cyclic graphs.

use std::collections::HashSet;

use tracing::debug;

use crate::allow_list::AllowList;
use crate::category::DataCategory;
use crate::exception::{ErrorGraph, ErrorNode, Field, NodeId, PublicKind, ReadOnlyField, Value};

/// Default prefix put in front of every scrubbed or kept message.
pub const DEFAULT_PREFIX: &str = "SystemLog:";

/// Default replacement for scrubbed text.
pub const DEFAULT_SCRUB_MESSAGE: &str = "**Exception message scrubbed**";

/// Rewrites error graphs so they are safe to print.
///
/// For every node the sanitizer decides once whether the node is kept
/// (`keep_message`, or a match in the allow-list) and applies that decision
/// to all of the node's fields:
///
/// | value        | kept                  | scrubbed                  |
/// |--------------|-----------------------|---------------------------|
/// | text         | `prefix + original`   | `prefix + scrub_message`  |
/// | list / tuple | rebuilt element-wise  | rebuilt element-wise      |
/// | callable     | untouched             | untouched                 |
/// | anything else| untouched             | [`Value::Absent`]         |
///
/// Fields whose name starts with `__` and fields that cannot be read are
/// skipped. If a transformed value cannot be written back, the whole node is
/// replaced by a `PublicRuntimeError` naming the field and the original type,
/// with the node's links and frames preserved.
///
/// # Examples
///
/// ```
/// use compliant_logging::{ErrorGraph, ErrorNode, Sanitizer};
///
/// let graph = ErrorGraph::new(ErrorNode::new("KeyError").with_message("alice@example.com"));
/// let clean = Sanitizer::default().sanitize(graph);
///
/// assert_eq!(
///     clean[clean.root()].message(),
///     "SystemLog:**Exception message scrubbed**"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Sanitizer {
    prefix: String,
    scrub_message: String,
    keep_message: bool,
    allow_list: AllowList,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            scrub_message: DEFAULT_SCRUB_MESSAGE.to_string(),
            keep_message: false,
            allow_list: AllowList::default(),
        }
    }
}

impl Sanitizer {
    /// Creates a sanitizer with the default prefix and scrub message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the replacement text.
    pub fn scrub_message(mut self, scrub_message: impl Into<String>) -> Self {
        self.scrub_message = scrub_message.into();
        self
    }

    /// Keeps every message (still prefixed).
    pub fn keep_message(mut self, keep: bool) -> Self {
        self.keep_message = keep;
        self
    }

    /// Sets the allow-list.
    pub fn allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// The configured prefix.
    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }

    /// Sanitizes every node reachable from the root.
    ///
    /// Unreachable nodes are dropped from the returned graph.
    pub fn sanitize(&self, mut graph: ErrorGraph) -> ErrorGraph {
        let mut visited = HashSet::new();
        let root = graph.root();
        self.sanitize_node(&mut graph, root, &mut visited);
        graph.prune()
    }

    fn sanitize_node(&self, graph: &mut ErrorGraph, id: NodeId, visited: &mut HashSet<NodeId>) {
        visited.insert(id);

        let (cause, context) = {
            let node = &graph[id];
            (node.cause(), node.context())
        };
        for next in [cause, context].into_iter().flatten() {
            if !visited.contains(&next) {
                self.sanitize_node(graph, next, visited);
            }
        }

        let keep = self.keep_message || self.allow_list.is_allowed(&graph[id]);
        if let Err(field) = self.scrub_fields(graph.node_mut(id), keep) {
            let original = &graph[id];
            debug!(
                category = %DataCategory::Public,
                field = %field,
                type_name = original.type_name(),
                "replacing error node after failed write-back"
            );
            let replacement = self.scrub_failure(original, &field);
            graph.replace(id, replacement);
        }
    }

    /// Transforms the fields of one node in place.
    ///
    /// Stops at the first read-only field and returns its name.
    fn scrub_fields(&self, node: &mut ErrorNode, keep: bool) -> Result<(), String> {
        for field in node.fields_mut() {
            if field.is_dunder() {
                continue;
            }
            let Some(value) = field.value() else {
                continue;
            };
            let scrubbed = self.transform(value, keep);
            if let Err(ReadOnlyField) = field.try_set(scrubbed) {
                return Err(field.name().to_string());
            }
        }
        Ok(())
    }

    fn transform(&self, value: &Value, keep: bool) -> Value {
        match value {
            Value::Text(text) if keep => Value::Text(format!("{}{}", self.prefix, text)),
            Value::Text(_) => Value::Text(format!("{}{}", self.prefix, self.scrub_message)),
            Value::List(items) => Value::List(self.transform_all(items, keep)),
            Value::Tuple(items) => Value::Tuple(self.transform_all(items, keep)),
            Value::Callable(_) => value.clone(),
            _ if keep => value.clone(),
            _ => Value::Absent,
        }
    }

    fn transform_all(&self, items: &[Value], keep: bool) -> Vec<Value> {
        items.iter().map(|item| self.transform(item, keep)).collect()
    }

    fn scrub_failure(&self, original: &ErrorNode, field: &str) -> ErrorNode {
        let message = format!(
            "{} Obtained {} when trying to scrub {} from {}",
            self.prefix,
            ReadOnlyField::NAME,
            field,
            original.type_name()
        );
        let mut node = ErrorNode::new(PublicKind::Runtime.type_name())
            .with_field(Field::message(message))
            .inherit_links(original);
        for frame in original.frames() {
            node = node.with_frame(frame.clone());
        }
        node
    }
}
