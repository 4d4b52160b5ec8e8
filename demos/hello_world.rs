//! Category-aware logging.
//!
//! PUBLIC records get the `SystemLog:` prefix, everything else is printed
//! bare so that downstream filters can drop it.
//!
//! Run with: `cargo run --example hello_world`

use compliant_logging::{enable, CompliantLog, DataCategory, LoggingConfig};
use tracing::Level;

fn main() -> compliant_logging::Result<()> {
    enable(LoggingConfig::new().level(Level::INFO))?;

    let log = CompliantLog::new("hello_world");
    log.public()
        .info(format_args!("Hello, world! This line is public."));
    log.info(format_args!("This line is private: customer=alice@example.com"));
    log.log(
        Level::WARN,
        DataCategory::Public,
        format_args!("Per-call categories override the logger default."),
    );

    // Plain tracing calls work too; without a category they are private.
    tracing::info!(category = %DataCategory::Public, "tracing macro, public");
    tracing::info!("tracing macro, private");
    Ok(())
}
