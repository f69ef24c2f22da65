//! Example: Parse an HDFS client configuration file
//!
//! This example parses a client configuration file and prints the namenode
//! endpoint, client options and the pass-through Hadoop parameters.
//!
//! Usage:
//!   cargo run --example parse_config /path/to/hdfs-client.conf

use hdfsconfig::{HdfsConfig, CLIENT_SECTION, GLOBAL_SECTION};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    let config_path = if args.len() > 1 {
        &args[1]
    } else {
        "/etc/hadoop/conf/hdfs-client.conf"
    };

    println!("Parsing HDFS client configuration from: {}", config_path);
    println!();

    let config = match HdfsConfig::from_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing config file: {}", e);
            std::process::exit(1);
        }
    };

    println!("Configuration sections:");
    for section in config.sections() {
        println!("  - [{}]", section);
    }
    println!();

    match (config.namenode_host(), config.namenode_port()) {
        (Ok(host), Ok(port)) => println!("Namenode: hdfs://{}:{}", host, port),
        (Err(e), _) | (_, Err(e)) => eprintln!("Could not resolve namenode: {}", e),
    }
    println!();

    println!("Client settings:");
    for section in [GLOBAL_SECTION, CLIENT_SECTION] {
        for key in config.keys(section) {
            if let Some(value) = config.get(section, key) {
                println!("  - [{}] {}: {}", section, key, value);
            }
        }
    }
    println!();

    let params = config.hadoop_params();
    println!("Hadoop parameters ({} total):", params.len());
    for (key, value) in &params {
        println!("  - {} = {}", key, value);
    }
}
