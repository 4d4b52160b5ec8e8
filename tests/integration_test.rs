use std::panic::{self, AssertUnwindSafe};

use compliant_logging::{
    AllowList, Error, ErrorGraph, ErrorNode, Exception, Field, MemorySink, PublicError,
    RaisedError, StackTrace, CAUSE_HEADER, CONTEXT_HEADER, TRACEBACK_HEADER,
};
use regex::Regex;

const SCRUBBED: &str = "**Exception message scrubbed**";

fn reporter() -> (StackTrace, MemorySink) {
    let output = MemorySink::new();
    let trace = StackTrace::new().sink(output.clone()).disable(false);
    (trace, output)
}

fn divide(a: i64, b: i64) -> Result<i64, Exception> {
    if b == 0 {
        return Err(Exception::new("ZeroDivisionError", "division by zero"));
    }
    Ok(a / b)
}

#[test]
fn division_by_zero_is_scrubbed() {
    let (trace, output) = reporter();

    let err = trace.call(|| divide(1, 0)).unwrap_err();

    let lines = output.lines();
    assert!(lines.contains(&format!("SystemLog: {}", TRACEBACK_HEADER)));
    assert!(lines.contains(&format!("SystemLog: ZeroDivisionError: {}", SCRUBBED)));
    assert!(!output.contents().contains("division by zero"));

    let message = err.to_string();
    assert!(message.starts_with("SystemLog:"));
    assert!(!message.contains("division by zero"));
    assert!(err.raised().unwrap().is_type("ZeroDivisionError"));
}

#[test]
fn keep_message_shows_original_text() {
    let (trace, output) = reporter();
    let trace = trace.keep_message(true);

    let err = trace.call(|| divide(1, 0)).unwrap_err();

    assert!(output
        .lines()
        .contains(&"SystemLog: ZeroDivisionError: division by zero".to_string()));
    assert_eq!(err.to_string(), "SystemLog:division by zero");
}

#[test]
fn successful_calls_pass_through() {
    let (trace, output) = reporter();
    assert_eq!(trace.call(|| divide(9, 3)).unwrap(), 3);
    assert!(output.is_empty());
}

#[test]
fn nested_cause_chain_hides_every_message() {
    let (trace, output) = reporter();

    let _ = trace.call(|| -> Result<(), Exception> {
        Err(Exception::new("B", "beta private").with_cause(Exception::new("A", "alpha private")))
    });

    let contents = output.contents();
    assert!(!contents.contains("alpha private"));
    assert!(!contents.contains("beta private"));
    assert!(contents.contains(&format!("SystemLog: A: {}", SCRUBBED)));
    assert!(contents.contains(&format!("SystemLog: B: {}", SCRUBBED)));
    assert!(contents.contains(CAUSE_HEADER));
    assert!(!contents.contains(CONTEXT_HEADER));
}

#[test]
fn context_chain_uses_context_separator() {
    let (trace, output) = reporter();

    let _ = trace.report::<(), _>(
        &Exception::new("KeyError", "k").with_context(Exception::new("IndexError", "i")),
    );

    let lines = output.lines();
    let context = lines
        .iter()
        .position(|l| l == &format!("SystemLog: {}", CONTEXT_HEADER))
        .unwrap();
    assert_eq!(lines[context - 1], "SystemLog: ");
    assert_eq!(lines[context + 1], "SystemLog: ");
}

#[test]
fn self_referential_error_terminates() {
    let (trace, output) = reporter();
    let mut graph = ErrorGraph::new(ErrorNode::new("LoopError").with_message("row 12 secret"));
    let root = graph.root();
    graph.set_cause(root, Some(root));

    let err = trace.emit_and_reraise::<()>(Some(graph)).unwrap_err();

    assert!(err.raised().unwrap().is_type("LoopError"));
    assert_eq!(output.lines(), vec![format!("SystemLog: LoopError: {}", SCRUBBED)]);
}

#[test]
fn read_only_attribute_never_leaks() {
    let (trace, output) = reporter();
    let err = Exception::new("UnicodeDecodeError", "byte 0xff in alice.csv")
        .with_field(Field::read_only("object", "alice,42,london"));

    let err = trace.report::<(), _>(&err).unwrap_err();

    let contents = output.contents();
    assert!(!contents.contains("alice"));
    assert!(contents.contains(
        "SystemLog: PublicRuntimeError: Obtained ReadOnlyField when trying to scrub object from UnicodeDecodeError"
    ));
    assert!(err.raised().unwrap().is_type("PublicRuntimeError"));
}

#[test]
fn allow_listed_errors_keep_messages() {
    let (trace, output) = reporter();
    let trace = trace.allow_list(AllowList::new(["modulenotfound"]).unwrap());

    let _ = trace.report::<(), _>(&Exception::new("ModuleNotFoundError", "No module named 'torch'"));
    let _ = trace.report::<(), _>(&Exception::new("ValueError", "bad value alice"));

    let contents = output.contents();
    assert!(contents.contains("SystemLog: ModuleNotFoundError: No module named 'torch'"));
    assert!(!contents.contains("alice"));
}

#[test]
fn public_errors_keep_messages() {
    let (trace, output) = reporter();

    let err = trace
        .call(|| -> Result<(), PublicError> { Err(PublicError::value("expected 3 columns")) })
        .unwrap_err();

    assert!(output
        .lines()
        .contains(&"SystemLog: PublicValueError: expected 3 columns".to_string()));
    assert_eq!(
        err.raised().and_then(RaisedError::public_kind),
        Some(compliant_logging::PublicKind::Value)
    );
}

#[test]
fn timestamp_is_inserted_when_requested() {
    let stamped = Regex::new(r"^SystemLog: \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} ").unwrap();

    let (trace, output) = reporter();
    let _ = trace.add_timestamp(true).call(|| divide(1, 0));
    let lines = output.lines();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|l| stamped.is_match(l)));

    let (trace, output) = reporter();
    let _ = trace.call(|| divide(1, 0));
    assert!(output.lines().iter().all(|l| !stamped.is_match(l)));
}

#[test]
fn custom_prefix_and_scrub_message() {
    let (trace, output) = reporter();
    let trace = trace.prefix("Public:").scrub_message("[redacted]");

    let err = trace.call(|| divide(1, 0)).unwrap_err();

    assert!(output
        .lines()
        .contains(&"Public: ZeroDivisionError: [redacted]".to_string()));
    assert_eq!(err.to_string(), "Public:[redacted]");
}

#[test]
fn panics_are_reported_and_resumed() {
    let (trace, output) = reporter();
    let zero = std::hint::black_box(0_i64);

    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        trace.call(|| -> Result<i64, Exception> { Ok(1 / zero) })
    }))
    .unwrap_err();

    let raised = payload.downcast::<RaisedError>().unwrap();
    assert!(raised.is_type("Panic"));
    assert!(!raised.to_string().contains("divide by zero"));

    let lines = output.lines();
    assert!(lines.contains(&format!("SystemLog: {}", TRACEBACK_HEADER)));
    assert!(lines.contains(&format!("SystemLog: Panic: {}", SCRUBBED)));
    assert!(!output.contents().contains("divide by zero"));
}

#[test]
fn nested_wrappers_report_once() {
    let (trace, output) = reporter();

    let inner = trace.wrap(|n: i64| divide(10, n));
    let err = trace.call(|| inner(0)).unwrap_err();

    let headlines = output
        .lines()
        .iter()
        .filter(|l| l.contains("ZeroDivisionError"))
        .count();
    assert_eq!(headlines, 1);
    assert_eq!(err.to_string(), format!("SystemLog:{}", SCRUBBED));
}

#[test]
fn wrapped_function_is_reusable() {
    let (trace, output) = reporter();
    let safe_divide = trace.wrap(|(a, b): (i64, i64)| divide(a, b));

    assert_eq!(safe_divide((8, 2)).unwrap(), 4);
    assert!(matches!(safe_divide((1, 0)), Err(Error::Raised(_))));
    assert!(!output.is_empty());
}

#[test]
fn scope_reports_error_on_exit() {
    let (trace, output) = reporter();

    let scope = trace.scope();
    let result = divide(1, 0);
    let err = scope.exit(result).unwrap_err();

    assert!(err.raised().unwrap().is_type("ZeroDivisionError"));
    assert!(output
        .lines()
        .contains(&format!("SystemLog: ZeroDivisionError: {}", SCRUBBED)));
}

#[test]
fn scope_does_nothing_on_success() {
    let (trace, output) = reporter();
    let scope = trace.scope();
    assert_eq!(scope.exit(divide(4, 2)).unwrap(), 2);
    assert!(output.is_empty());
}

#[test]
fn disabled_reporter_passes_errors_through_raw() {
    let (trace, output) = reporter();
    let trace = trace.disable(true);

    let err = trace.call(|| divide(1, 0)).unwrap_err();
    assert_eq!(err.to_string(), "division by zero");

    let err = trace.scope().exit(divide(1, 0)).unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
    assert!(output.is_empty());
}

#[test]
fn io_errors_are_scrubbed() {
    let (trace, output) = reporter();

    let err = trace
        .call(|| std::fs::read_to_string("/no/such/dir/alice_private.csv"))
        .unwrap_err();

    assert!(!output.contents().contains("alice_private"));
    assert!(err.raised().unwrap().is_type("NotFoundError"));
}
