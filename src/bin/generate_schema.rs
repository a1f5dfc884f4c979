//! Generate JSON Schema for the jshost config file
//!
//! This binary generates a JSON Schema from the HostConfig struct using schemars.
//! Point editors at the output to get completion for config.json.
//!
//! Usage:
//!   cargo run --features dev-bins --bin generate_schema > config-schema.json

use jshost::config::HostConfig;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(HostConfig);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("Failed to serialize schema: {}", err);
            std::process::exit(1);
        }
    }
}
