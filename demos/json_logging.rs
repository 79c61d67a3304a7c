//! JSON structured logging example.
//!
//! This example demonstrates production output, where every line is a JSON
//! object, and routing `tracing` events through the same logger.

use svclog::{Log, fields};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = svclog::builder("checkout")
        .with_environment("production")
        .with_level("info")
        .with_default_field("version", env!("CARGO_PKG_VERSION"))
        .try_init()?;

    svclog::init_tracing(&logger)?;

    logger
        .with_fields(fields! { "user_id" => 123, "action" => "login" })
        .info("User logged in");

    tracing::warn!(error_code = 404, "Resource not found");
    tracing::error!(component = "auth", error = "Authentication failed");

    Ok(())
}
