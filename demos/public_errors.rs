//! Public errors keep their message.
//!
//! Errors of the public family are written by the application for the
//! operator, so the reporter prints them verbatim.
//!
//! Run with: `cargo run --example public_errors`

use compliant_logging::{PublicError, PublicKind, StackTrace};

fn check_columns(found: usize) -> Result<(), PublicError> {
    if found != 3 {
        return Err(PublicError::new(
            PublicKind::Value,
            format!("expected 3 columns, found {}", found),
        ));
    }
    Ok(())
}

fn main() {
    let trace = StackTrace::new().disable(false);
    match trace.call(|| check_columns(5)) {
        Ok(()) => println!("columns ok"),
        Err(err) => {
            let kind = err.raised().and_then(|raised| raised.public_kind());
            println!("reported {:?}: {}", kind, err);
        }
    }
}
