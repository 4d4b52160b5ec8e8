//! Property tests for the scrubbing pipeline.
//!
//! These check that private text never reaches the output regardless of the
//! shape of the error graph, and that allow-list matching is insensitive to
//! case.

use compliant_logging::{
    AllowList, ErrorGraph, ErrorNode, Field, MemorySink, Sanitizer, StackTrace, Value,
};
use proptest::prelude::*;

// Strategy: private payloads that are easy to search for in the output
fn arb_secret() -> impl Strategy<Value = String> {
    prop::string::string_regex("secret-[a-z0-9]{6,12}").unwrap()
}

// Strategy: error type names
fn arb_type_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,8}Error").unwrap()
}

// Strategy: field values carrying the secret somewhere inside
fn arb_value(secret: String) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Text(secret.clone())),
        Just(Value::Opaque(secret.clone())),
        any::<i64>().prop_map(Value::Integer),
    ];
    leaf.prop_recursive(3, 12, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::vec(inner, 0..4).prop_map(Value::Tuple),
        ]
    })
}

// Strategy: a node with a secret message and a few secret-bearing fields
fn arb_node(secret: String) -> impl Strategy<Value = ErrorNode> {
    (
        arb_type_name(),
        prop::collection::vec(arb_value(secret.clone()), 0..3),
        any::<bool>(),
    )
        .prop_map(move |(type_name, values, read_only)| {
            let mut node = ErrorNode::new(type_name).with_message(secret.clone());
            for (i, value) in values.into_iter().enumerate() {
                let name = format!("attr{}", i);
                node = node.with_field(if read_only {
                    Field::read_only(name, value)
                } else {
                    Field::new(name, value)
                });
            }
            node
        })
}

// Strategy: a graph of up to five nodes with arbitrary (possibly cyclic) links
fn arb_graph() -> impl Strategy<Value = (ErrorGraph, String)> {
    arb_secret().prop_flat_map(|secret| {
        (
            prop::collection::vec(arb_node(secret.clone()), 1..5),
            prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 5),
            prop::collection::vec(any::<(bool, bool)>(), 5),
            Just(secret),
        )
            .prop_map(|(nodes, links, present, secret)| {
                let mut nodes = nodes.into_iter();
                let mut graph = ErrorGraph::new(nodes.next().unwrap());
                let mut ids = vec![graph.root()];
                ids.extend(nodes.map(|node| graph.add(node)));

                for (i, id) in ids.iter().enumerate() {
                    let (cause, context) = links[i];
                    let (has_cause, has_context) = present[i];
                    if has_cause {
                        graph.set_cause(*id, Some(ids[cause.index(ids.len())]));
                    }
                    if has_context {
                        graph.set_context(*id, Some(ids[context.index(ids.len())]));
                    }
                }
                (graph, secret)
            })
    })
}

proptest! {
    /// Property: with no allow-list and keep_message off, nothing private
    /// survives sanitization, whatever the graph looks like.
    #[test]
    fn proptest_sanitized_graph_never_contains_secret((graph, secret) in arb_graph()) {
        let clean = Sanitizer::default().sanitize(graph);

        for id in clean.reachable() {
            let node = &clean[id];
            for field in node.fields() {
                if let Some(value) = field.value() {
                    let debug = format!("{:?}", value);
                    prop_assert!(!debug.contains(&secret));
                }
            }
        }
        prop_assert!(!clean.render(None).join("\n").contains(&secret));
    }

    /// Property: the emitted trace never contains the secret and every line
    /// carries the prefix.
    #[test]
    fn proptest_emitted_trace_is_prefixed_and_clean((graph, secret) in arb_graph()) {
        let output = MemorySink::new();
        let trace = StackTrace::new().sink(output.clone()).disable(false);

        let result = trace.emit_and_reraise::<()>(Some(graph));

        prop_assert!(result.is_err());
        prop_assert!(!output.contents().contains(&secret));
        prop_assert!(output.lines().iter().all(|l| l.starts_with("SystemLog: ")));
        let message = result.unwrap_err().to_string();
        prop_assert!(!message.contains(&secret));
    }

    /// Property: an error of type X matches pattern X in any letter case.
    #[test]
    fn proptest_allow_list_ignores_case(
        type_name in arb_type_name(),
        message in ".{0,20}",
        upper in any::<bool>()
    ) {
        let pattern = if upper { type_name.to_uppercase() } else { type_name.to_lowercase() };
        let allow = AllowList::new([regex::escape(&pattern)]).unwrap();
        let node = ErrorNode::new(type_name).with_message(message);

        prop_assert!(allow.is_allowed(&node));
    }

    /// Property: keep_message keeps every text field, prefixed.
    #[test]
    fn proptest_keep_message_prefixes_text(secret in arb_secret(), type_name in arb_type_name()) {
        let graph = ErrorGraph::new(ErrorNode::new(type_name).with_message(secret.clone()));
        let clean = Sanitizer::default().keep_message(true).sanitize(graph);

        prop_assert_eq!(clean[clean.root()].message(), format!("SystemLog:{}", secret));
    }
}
