//! Example of loading logger configuration from TOML.
//!
//! Run with:
//! ```bash
//! cargo run --example config_toml
//! ```

use serde::Deserialize;
use svclog::{Log, Logger};

const CONFIG: &str = r#"
[log]
service_name = "billing"
environment_name = "staging"
log_level = "debug"
# Leave blank to keep logs local; LOGSTASH_PORT is read when the port is blank
logstash_server = ""

[log.default_fields]
team = "payments"
shard = 3
"#;

#[derive(Deserialize)]
struct Root {
    log: svclog::Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root: Root = toml::from_str(CONFIG)?;
    let logger = Logger::try_new(&root.log)?;

    logger.trace("This is a trace message (not visible at debug)");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");

    Ok(())
}
