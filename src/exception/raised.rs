use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::{ErrorGraph, Field, Frame, Link, NodeId, PublicKind, Scrubbable};

/// The error handed back to callers after a failure has been reported.
///
/// Built from an [`ErrorGraph`]. `Display` shows the message only,
/// `source()` walks the cause chain (falling back to the context when
/// there is no cause), and the type name of the original error is kept so
/// callers can still branch on it.
///
/// Only errors produced by a reporter are marked as sanitized
/// ([`is_sanitized`](Self::is_sanitized)). Enclosing reporters pass those
/// through untouched; anything else, including errors built with
/// [`from_graph`](Self::from_graph), is scrubbed and printed again.
///
/// # Examples
///
/// ```
/// use compliant_logging::{ErrorGraph, ErrorNode, RaisedError};
///
/// let graph = ErrorGraph::new(ErrorNode::new("ValueError").with_message("SystemLog:oops"));
/// let raised = RaisedError::from_graph(graph);
///
/// assert!(raised.is_type("ValueError"));
/// assert!(!raised.is_sanitized());
/// assert_eq!(raised.to_string(), "SystemLog:oops");
/// ```
#[derive(Debug, Clone)]
pub struct RaisedError {
    type_name: String,
    message: String,
    source: Option<Box<RaisedError>>,
    graph: Arc<ErrorGraph>,
    sanitized: bool,
}

impl RaisedError {
    /// Wraps the root of `graph`. The result is not trusted as sanitized.
    pub fn from_graph(graph: ErrorGraph) -> Self {
        Self::build(graph, false)
    }

    /// Wraps a graph that went through the sanitizer.
    pub(crate) fn sanitized(graph: ErrorGraph) -> Self {
        Self::build(graph, true)
    }

    fn build(graph: ErrorGraph, sanitized: bool) -> Self {
        let graph = Arc::new(graph);
        let mut seen = HashSet::new();
        Self::at(&graph, graph.root(), sanitized, &mut seen)
    }

    fn at(
        graph: &Arc<ErrorGraph>,
        id: NodeId,
        sanitized: bool,
        seen: &mut HashSet<NodeId>,
    ) -> Self {
        seen.insert(id);
        let node = &graph[id];
        let next = node
            .cause()
            .or(node.context())
            .filter(|next| !seen.contains(next));
        let source = next.map(|next| Box::new(Self::at(graph, next, sanitized, seen)));

        Self {
            type_name: node.type_name().to_string(),
            message: node.message(),
            source,
            graph: Arc::clone(graph),
            sanitized,
        }
    }

    /// `true` if a reporter produced this error after sanitizing it.
    pub fn is_sanitized(&self) -> bool {
        self.sanitized
    }

    /// Type name of the reported error.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// `true` if the reported error has exactly this type name.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    /// The public kind, for errors of the public family.
    pub fn public_kind(&self) -> Option<PublicKind> {
        PublicKind::from_type_name(&self.type_name)
    }

    /// The reported message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The graph this error was built from.
    pub fn graph(&self) -> &ErrorGraph {
        &self.graph
    }
}

impl fmt::Display for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.type_name)
        } else {
            f.write_str(&self.message)
        }
    }
}

impl std::error::Error for RaisedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Exposes the reported graph again, so an already reported error can be
/// captured by an enclosing reporter.
impl Scrubbable for RaisedError {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.type_name)
    }

    fn fields(&self) -> Vec<Field> {
        self.root_view().fields()
    }

    fn frames(&self) -> Vec<Frame> {
        self.root_view().frames()
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        self.root_view().links(visit);
    }

    fn identity(&self) -> usize {
        self.root_view().identity()
    }
}

impl RaisedError {
    fn root_view(&self) -> NodeView<'_> {
        NodeView {
            graph: &self.graph,
            id: self.graph.root(),
        }
    }
}

struct NodeView<'a> {
    graph: &'a ErrorGraph,
    id: NodeId,
}

impl Scrubbable for NodeView<'_> {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.graph[self.id].type_name())
    }

    fn fields(&self) -> Vec<Field> {
        self.graph[self.id].fields().to_vec()
    }

    fn frames(&self) -> Vec<Frame> {
        self.graph[self.id].frames().to_vec()
    }

    fn links(&self, visit: &mut dyn FnMut(Link, &dyn Scrubbable)) {
        let node = &self.graph[self.id];
        if let Some(cause) = node.cause() {
            visit(Link::Cause, &self.at(cause));
        }
        if let Some(context) = node.context() {
            visit(Link::Context, &self.at(context));
        }
    }

    /// Node addresses inside the arena are unique per graph.
    fn identity(&self) -> usize {
        (&self.graph[self.id] as *const super::ErrorNode) as usize
    }
}

impl NodeView<'_> {
    fn at(&self, id: NodeId) -> Self {
        NodeView {
            graph: self.graph,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorNode;
    use std::error::Error;

    #[test]
    fn source_follows_cause_then_context() {
        let mut graph = ErrorGraph::new(ErrorNode::new("B").with_message("b"));
        let a = graph.add(ErrorNode::new("A").with_message("a"));
        let c = graph.add(ErrorNode::new("C").with_message("c"));
        let root = graph.root();
        graph.set_cause(root, Some(a));
        graph.set_context(a, Some(c));

        let raised = RaisedError::from_graph(graph);
        let first = raised.source().unwrap();
        assert_eq!(first.to_string(), "a");
        assert_eq!(first.source().unwrap().to_string(), "c");
    }

    #[test]
    fn self_cause_does_not_recurse() {
        let mut graph = ErrorGraph::new(ErrorNode::new("LoopError"));
        let root = graph.root();
        graph.set_cause(root, Some(root));

        let raised = RaisedError::from_graph(graph);
        assert!(raised.source().is_none());
        assert_eq!(raised.to_string(), "LoopError");
    }

    #[test]
    fn recapture_preserves_structure_and_cycles() {
        let mut graph = ErrorGraph::new(ErrorNode::new("B").with_message("SystemLog:b"));
        let a = graph.add(ErrorNode::new("A").with_message("SystemLog:a"));
        let root = graph.root();
        graph.set_cause(root, Some(a));
        graph.set_context(a, Some(root));

        let again = ErrorGraph::capture(&RaisedError::from_graph(graph));
        assert_eq!(again.len(), 2);
        let root = &again[again.root()];
        assert_eq!(root.message(), "SystemLog:b");
        let cause = root.cause().unwrap();
        assert_eq!(again[cause].context(), Some(again.root()));
    }

    #[test]
    fn only_reporter_output_is_marked_sanitized() {
        let graph = ErrorGraph::new(ErrorNode::new("KeyError").with_message("ssn 123-45-6789"));
        assert!(!RaisedError::from_graph(graph.clone()).is_sanitized());

        let marked = RaisedError::sanitized(graph);
        assert!(marked.is_sanitized());
        assert!(marked.clone().is_sanitized());
    }

    #[test]
    fn public_kind_is_recognised() {
        let graph = ErrorGraph::new(ErrorNode::new("PublicKeyError").with_message("k"));
        assert_eq!(
            RaisedError::from_graph(graph).public_kind(),
            Some(PublicKind::Key)
        );
    }
}
