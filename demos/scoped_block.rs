//! Reporting scope around a block.
//!
//! The scope reports a returned error on `exit`, and a panic when it is
//! dropped during unwinding.
//!
//! Run with: `cargo run --example scoped_block`

use std::panic;

use compliant_logging::{Exception, StackTrace};

fn lookup(key: &str) -> Result<u32, Exception> {
    Err(Exception::new("KeyError", key.to_string()))
}

fn main() {
    let trace = StackTrace::new().disable(false);

    let scope = trace.scope();
    let result = lookup("customer-4411");
    if let Err(err) = scope.exit(result) {
        println!("caller sees: {}", err);
    }

    let outcome = panic::catch_unwind(|| {
        let trace = StackTrace::new().disable(false);
        let _scope = trace.scope();
        let rows: Vec<u32> = Vec::new();
        rows[std::hint::black_box(3)]
    });
    println!("panic propagated: {}", outcome.is_err());
}
