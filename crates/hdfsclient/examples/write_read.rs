//! Write a file to an in-memory cluster, read it back and show its blocks
//!
//! Usage:
//!   cargo run --package hdfsclient --example write_read

use hdfsclient::{
    FilesystemSession, HdfsError, MiniCluster, MiniClusterConfig, OpenMode, OpenOptions,
    SessionConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cluster = MiniCluster::new(
        MiniClusterConfig::new("localhost", 9000).with_block_size(16 * 1024),
    );
    let fs = FilesystemSession::new(cluster, SessionConfig::new("localhost"))?;
    println!("{}", fs);

    fs.mkdir("/demo")?;
    let payload = b"Hello HDFS! ".repeat(4096);
    fs.with_file(
        "/demo/hello.txt",
        OpenMode::Write,
        OpenOptions::default().with_replication(2),
        |f| {
            println!("{}", f);
            f.write(&payload)
        },
    )?;

    let info = fs.info("/demo/hello.txt")?;
    println!(
        "{} {} {} bytes, replication {}",
        info.mode_string(),
        info.path(),
        info.size,
        info.replication
    );

    let read = fs.with_file("/demo/hello.txt", OpenMode::Read, OpenOptions::default(), |f| {
        let mut total = 0;
        loop {
            let chunk = f.read(64 * 1024)?;
            if chunk.is_empty() {
                break;
            }
            total += chunk.len();
        }
        Ok::<_, HdfsError>(total)
    })?;
    println!("Read back {} bytes", read);

    for block in fs.get_block_locations("/demo/hello.txt", 0, None)? {
        println!(
            "  block @{} ({} bytes) on {}",
            block.offset,
            block.length,
            block.hosts.join(", ")
        );
    }

    fs.remove("/demo", true)?;
    Ok(())
}
