//! Basic service logging example.
//!
//! Run with:
//! ```bash
//! cargo run --example basic
//! ```

use svclog::{Config, Log, Logger, fields};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new("inventory")
        .with_level("debug")
        .with_default_field("region", "eu-west-1");
    let logger = Logger::try_new(&config)?;

    logger.debug("warming caches");
    logger.info("service started");

    // One entry per request, carrying its own fields
    let request = logger.with_fields(fields! { "req_id" => "8f2c", "path" => "/items" });
    request.info(svclog::message!["found", 12, "items"]);
    request.warn("slow query");

    Ok(())
}
