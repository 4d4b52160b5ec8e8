//! Scrubbed stack traces.
//!
//! A failing function is wrapped so that its error is printed with every
//! line prefixed and the message scrubbed, then handed back to `main`.
//!
//! Run with: `cargo run --example prefix_stack_trace`

use compliant_logging::{AllowList, Exception, StackTrace};

fn load_row(line: usize) -> Result<String, Exception> {
    Err(Exception::new("ValueError", format!("could not parse 'alice,42,london' at line {}", line))
        .with_cause(Exception::new("ParseIntError", "invalid digit found in string")))
}

fn main() {
    let trace = StackTrace::new().disable(false);

    println!("--- scrubbed ---");
    if let Err(err) = trace.call(|| load_row(12)) {
        println!("caller sees: {}", err);
    }

    println!("--- message kept, with timestamps ---");
    let _ = trace
        .clone()
        .keep_message(true)
        .add_timestamp(true)
        .call(|| load_row(13));

    println!("--- allow-listed cause ---");
    let allow = match AllowList::new(["parseint"]) {
        Ok(allow) => allow,
        Err(err) => {
            eprintln!("invalid allow-list: {}", err);
            return;
        }
    };
    let _ = trace.allow_list(allow).call(|| load_row(14));
}
