//! Arena representation of an error and everything linked to it.

use std::collections::{HashMap, HashSet};
use std::ops::Index;

use super::{Field, Frame, Link, Scrubbable, Value, MESSAGE_FIELD};

/// Separator rendered between a cause and the error it caused.
pub const CAUSE_HEADER: &str =
    "The above exception was the direct cause of the following exception:";

/// Separator rendered between a context and the error raised while
/// handling it.
pub const CONTEXT_HEADER: &str =
    "During handling of the above exception, another exception occurred:";

/// Header line preceding the frames of a trace.
pub const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

/// Handle of a node inside one [`ErrorGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its graph.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One error in a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorNode {
    type_name: String,
    fields: Vec<Field>,
    frames: Vec<Frame>,
    cause: Option<NodeId>,
    context: Option<NodeId>,
}

impl ErrorNode {
    /// Creates a node with no fields, frames, or links.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
            frames: Vec::new(),
            cause: None,
            context: None,
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a `message` field.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with_field(Field::message(message))
    }

    /// Adds a frame.
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Frames, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Direct cause.
    pub fn cause(&self) -> Option<NodeId> {
        self.cause
    }

    /// Error being handled when this one occurred.
    pub fn context(&self) -> Option<NodeId> {
        self.context
    }

    /// The rendered `message` field, or an empty string.
    pub fn message(&self) -> String {
        self.field(MESSAGE_FIELD)
            .and_then(Field::value)
            .map(Value::to_string)
            .unwrap_or_default()
    }

    /// `Type: message`, or just `Type` when the message is empty.
    ///
    /// A leading `strip_prefix` is removed from the message first.
    pub fn headline(&self, strip_prefix: Option<&str>) -> String {
        let message = self.message();
        let shown = match strip_prefix {
            Some(prefix) if !prefix.is_empty() => message
                .strip_prefix(prefix)
                .map(str::trim_start)
                .unwrap_or(message.as_str()),
            _ => message.as_str(),
        };
        if shown.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}: {}", self.type_name, shown)
        }
    }

    /// Moves the links of `other` onto this node.
    pub(crate) fn inherit_links(mut self, other: &ErrorNode) -> Self {
        self.cause = other.cause;
        self.context = other.context;
        self
    }
}

/// An error together with every error reachable through its cause and
/// context links.
///
/// Nodes live in an arena and refer to each other by [`NodeId`], so
/// self-references and cycles between cause and context are representable.
///
/// # Examples
///
/// ```
/// use compliant_logging::{ErrorGraph, ErrorNode};
///
/// let mut graph = ErrorGraph::new(ErrorNode::new("LoopError").with_message("row 12"));
/// let root = graph.root();
/// graph.set_cause(root, Some(root));
///
/// assert_eq!(graph[root].cause(), Some(root));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorGraph {
    nodes: Vec<ErrorNode>,
    root: NodeId,
}

impl ErrorGraph {
    /// Creates a graph holding a single root node.
    pub fn new(root: ErrorNode) -> Self {
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Captures an error and everything it links to.
    ///
    /// A link back to an error on the current path (a cycle) points at that
    /// error's node, matched by [`Scrubbable::identity`] and type name.
    /// Only ancestors are matched: views handed to `links` may be
    /// temporaries, and a finished sibling's address can be reused.
    pub fn capture(error: &dyn Scrubbable) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let mut path = HashMap::new();
        graph.root = graph.capture_into(error, &mut path);
        graph
    }

    fn capture_into(
        &mut self,
        error: &dyn Scrubbable,
        path: &mut HashMap<(usize, String), NodeId>,
    ) -> NodeId {
        let type_name = error.type_name().into_owned();
        let key = (error.identity(), type_name.clone());
        if let Some(&id) = path.get(&key) {
            return id;
        }

        let id = self.add(ErrorNode {
            type_name,
            fields: error.fields(),
            frames: error.frames(),
            cause: None,
            context: None,
        });
        path.insert(key.clone(), id);

        error.links(&mut |link, next| {
            let target = self.capture_into(next, path);
            match link {
                Link::Cause => self.nodes[id.0].cause = Some(target),
                Link::Context => self.nodes[id.0].context = Some(target),
            }
        });
        path.remove(&key);
        id
    }

    /// Adds a detached node and returns its handle.
    pub fn add(&mut self, node: ErrorNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Handle of the root error.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the node for `id`, if it belongs to this graph.
    pub fn get(&self, id: NodeId) -> Option<&ErrorNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ErrorNode {
        &mut self.nodes[id.0]
    }

    /// Replaces the node stored under `id`, keeping every link that points
    /// at it.
    pub(crate) fn replace(&mut self, id: NodeId, node: ErrorNode) {
        self.nodes[id.0] = node;
    }

    /// Sets the cause of `of`.
    ///
    /// # Panics
    ///
    /// Panics if either handle does not belong to this graph.
    pub fn set_cause(&mut self, of: NodeId, cause: Option<NodeId>) {
        self.check(cause);
        self.nodes[of.0].cause = cause;
    }

    /// Sets the context of `of`.
    ///
    /// # Panics
    ///
    /// Panics if either handle does not belong to this graph.
    pub fn set_context(&mut self, of: NodeId, context: Option<NodeId>) {
        self.check(context);
        self.nodes[of.0].context = context;
    }

    fn check(&self, id: Option<NodeId>) {
        if let Some(id) = id {
            assert!(id.0 < self.nodes.len(), "node {} is not in this graph", id.0);
        }
    }

    /// Number of nodes, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a graph has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes reachable from the root, in depth-first order (cause before
    /// context).
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            let node = &self.nodes[id.0];
            stack.extend(node.context);
            stack.extend(node.cause);
        }
        order
    }

    /// Drops every node that is not reachable from the root.
    pub fn prune(self) -> Self {
        let order = self.reachable();
        let remap: HashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, NodeId(new)))
            .collect();

        let mut slots: Vec<Option<ErrorNode>> = self.nodes.into_iter().map(Some).collect();
        let nodes = order
            .iter()
            .filter_map(|old| slots[old.0].take())
            .map(|mut node| {
                node.cause = node.cause.and_then(|c| remap.get(&c).copied());
                node.context = node.context.and_then(|c| remap.get(&c).copied());
                node
            })
            .collect();

        Self {
            nodes,
            root: NodeId(0),
        }
    }

    /// Renders the full trace, one entry per physical line.
    ///
    /// Linked errors are rendered first, followed by a separator, then the
    /// root. A cause suppresses the context. Frames of the invocation
    /// wrappers are omitted. Every node is rendered at most once.
    pub fn render(&self, strip_prefix: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        let mut seen = HashSet::new();
        self.render_node(self.root, strip_prefix, &mut seen, &mut lines);
        lines
    }

    fn render_node(
        &self,
        id: NodeId,
        strip_prefix: Option<&str>,
        seen: &mut HashSet<NodeId>,
        lines: &mut Vec<String>,
    ) {
        seen.insert(id);
        let node = &self.nodes[id.0];

        let linked = match (node.cause, node.context) {
            (Some(cause), _) => Some((cause, CAUSE_HEADER)),
            (None, Some(context)) => Some((context, CONTEXT_HEADER)),
            (None, None) => None,
        };
        if let Some((next, header)) = linked {
            if !seen.contains(&next) {
                self.render_node(next, strip_prefix, seen, lines);
                lines.push(String::new());
                lines.push(header.to_string());
                lines.push(String::new());
            }
        }

        let mut frames = node.frames.iter().filter(|f| !f.is_internal()).peekable();
        if frames.peek().is_some() {
            lines.push(TRACEBACK_HEADER.to_string());
            lines.extend(frames.map(Frame::to_string));
        }
        lines.extend(node.headline(strip_prefix).lines().map(str::to_string));
    }
}

impl Index<NodeId> for ErrorGraph {
    type Output = ErrorNode;

    fn index(&self, id: NodeId) -> &ErrorNode {
        &self.nodes[id.0]
    }
}
