//! Extracting trace structure from a log file.
//!
//! Writes a log containing a Python traceback next to private data, then
//! prints only the structure of the traceback.
//!
//! Run with: `cargo run --example extract_traces`

use std::env;
use std::fs;

use compliant_logging::StackTraceExtractor;

const LOG: &str = "\
loading rows for customer alice@example.com
Traceback (most recent call last):
  File \"/mnt/job/train.py\", line 40, in <module>
    main()
  File \"/mnt/job/train.py\", line 31, in main
    scores = score(rows)
ZeroDivisionError: division by zero
";

fn main() -> compliant_logging::Result<()> {
    let path = env::temp_dir().join("compliant_logging_demo.err");
    if let Err(err) = fs::write(&path, LOG) {
        eprintln!("could not write {}: {}", path.display(), err);
        return Ok(());
    }

    StackTraceExtractor::new().extract(&path)?;
    StackTraceExtractor::new()
        .show_exception_message(true)
        .extract(&path)?;

    let _ = fs::remove_file(&path);
    Ok(())
}
