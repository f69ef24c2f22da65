//! Integration tests for session and file operations against the in-memory cluster
//!
//! To run these tests:
//! ```bash
//! cargo test --package hdfsclient --test mini_cluster_operations -- --nocapture
//! ```

use hdfsclient::{
    FilesystemSession, HdfsError, MiniCluster, MiniClusterConfig, OpenMode, OpenOptions,
    SessionConfig,
};
use rand::{Rng, RngCore};
use std::io::{Read, Write};
use tracing::info;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn connect(cluster: &MiniCluster) -> FilesystemSession<MiniCluster> {
    FilesystemSession::new(cluster.clone(), SessionConfig::new("nn1").with_port(9000))
        .expect("Failed to connect to mini cluster")
}

/// Read until an empty chunk and return everything
fn read_all(fs: &FilesystemSession<MiniCluster>, path: &str, chunk: usize) -> Vec<u8> {
    fs.with_file(path, OpenMode::Read, OpenOptions::default(), |f| {
        let mut out = Vec::new();
        loop {
            let data = f.read(chunk)?;
            if data.is_empty() {
                break;
            }
            out.extend_from_slice(&data);
        }
        Ok::<_, HdfsError>(out)
    })
    .expect("Failed to read file")
}

#[test]
fn test_scenario_write_read_remove() {
    init_tracing();
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    assert!(fs.mkdir("/t").unwrap());

    let payload = b"ab".repeat(1000);
    fs.with_file(
        "/t/f",
        OpenMode::Write,
        OpenOptions::default().with_replication(1),
        |f| f.write(&payload),
    )
    .unwrap();

    let info = fs.info("/t/f").unwrap();
    assert_eq!(info.size, 2000);
    assert_eq!(info.replication, 1);
    assert!(info.is_file());

    assert_eq!(read_all(&fs, "/t/f", 300), payload);

    assert!(fs.remove("/t", true).unwrap());
    assert!(!fs.exists("/t").unwrap());
    info!("scenario complete: {}", fs);
}

#[test]
fn test_round_trip_sizes() {
    init_tracing();
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000).with_packet_size(4096));
    let fs = connect(&cluster);
    let mut rng = rand::thread_rng();

    for size in [0usize, 1, 3 * 4096 + 17] {
        let mut payload = vec![0u8; size];
        rng.fill_bytes(&mut payload);
        let path = format!("/rt/{}", size);

        fs.with_file(&path, OpenMode::Write, OpenOptions::default(), |f| {
            f.write(&payload)
        })
        .unwrap();

        assert_eq!(fs.info(&path).unwrap().size, size as u64);
        assert_eq!(read_all(&fs, &path, 4096), payload, "size {}", size);
    }
}

#[test]
fn test_wrong_mode_never_reaches_cluster() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    let mut writer = fs
        .open("/f", OpenMode::Write, OpenOptions::default())
        .unwrap();
    assert!(writer.read(16).unwrap_err().is_precondition());
    writer.write(b"abc").unwrap();
    writer.close().unwrap();

    let mut reader = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
    assert!(reader.write(b"x").unwrap_err().is_precondition());
    reader.close().unwrap();

    assert_eq!(cluster.calls("read"), 0);
    assert_eq!(cluster.calls("write"), 1);
}

#[test]
fn test_block_locations_cover_range() {
    let block_size = 1000u64;
    let cluster = MiniCluster::new(
        MiniClusterConfig::new("nn1", 9000)
            .with_block_size(block_size)
            .with_datanodes(["dn1", "dn2", "dn3", "dn4"]),
    );
    let fs = connect(&cluster);

    let size = 4321usize;
    fs.with_file(
        "/blocks",
        OpenMode::Write,
        OpenOptions::default().with_replication(2),
        |f| f.write(&vec![1u8; size]),
    )
    .unwrap();

    let blocks = fs.get_block_locations("/blocks", 0, None).unwrap();
    assert_eq!(blocks.len(), 5);
    assert_eq!(blocks[0].offset, 0);
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset, "blocks overlap or leave a gap");
    }
    assert_eq!(blocks.last().unwrap().end(), size as u64);
    assert!(blocks.iter().all(|b| b.hosts.len() == 2));

    // A sub-range returns exactly the intersecting blocks
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let start = rng.gen_range(0..size as u64);
        let length = rng.gen_range(1..=size as u64 - start);
        let sub = fs.get_block_locations("/blocks", start, Some(length)).unwrap();
        assert!(sub.first().unwrap().offset <= start);
        assert!(sub.last().unwrap().end() >= start + length);
        for pair in sub.windows(2) {
            assert_eq!(pair[0].end(), pair[1].offset);
        }
    }

    assert!(fs
        .get_block_locations("/blocks", 0, Some(0))
        .unwrap()
        .is_empty());
}

#[test]
fn test_double_close_releases_once() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    let mut f = fs
        .open("/f", OpenMode::Write, OpenOptions::default())
        .unwrap();
    f.write(b"x").unwrap();
    f.close().unwrap();
    f.close().unwrap();
    drop(f);

    assert_eq!(cluster.calls("close_file"), 1);
    assert_eq!(cluster.calls("flush"), 1);
    assert_eq!(cluster.open_files(), 0);
}

#[test]
fn test_open_missing_for_read() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    let err = fs
        .open("/does/not/exist", OpenMode::Read, OpenOptions::default())
        .unwrap_err();
    assert!(matches!(err, HdfsError::OpenFailed { .. }));
    assert!(!err.is_precondition());
}

#[test]
fn test_append_extends_file() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    fs.with_file("/log", OpenMode::Write, OpenOptions::default(), |f| {
        f.write(b"one\n")
    })
    .unwrap();
    fs.with_file("/log", OpenMode::Append, OpenOptions::default(), |f| {
        assert_eq!(f.tell()?, 4);
        f.write(b"two\n")
    })
    .unwrap();

    assert_eq!(read_all(&fs, "/log", 64), b"one\ntwo\n");

    // Appending to a missing file fails at open
    assert!(fs
        .open("/nope", OpenMode::Append, OpenOptions::default())
        .is_err());
}

#[test]
fn test_with_file_closes_on_error() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    let result: Result<(), HdfsError> =
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"partial")?;
            Err(HdfsError::InvalidArgument("stop".into()))
        });
    assert!(matches!(result, Err(HdfsError::InvalidArgument(_))));
    assert_eq!(cluster.open_files(), 0);
    // Buffered data was still flushed by the close
    assert_eq!(fs.info("/f").unwrap().size, 7);
}

#[test]
fn test_std_io_copy() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000).with_packet_size(100));
    let fs = connect(&cluster);

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    fs.with_file("/copy", OpenMode::Write, OpenOptions::default(), |f| {
        f.write_all(&payload)
    })
    .unwrap();

    let mut out = Vec::new();
    fs.with_file("/copy", OpenMode::Read, OpenOptions::default(), |f| {
        std::io::copy(f, &mut out)
    })
    .unwrap();
    assert_eq!(out, payload);

    let mut f = fs.open("/copy", OpenMode::Read, OpenOptions::default()).unwrap();
    let mut head = [0u8; 10];
    f.read_exact(&mut head).unwrap();
    assert_eq!(&head[..], &payload[..10]);
}

#[test]
fn test_namespace_operations() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let fs = connect(&cluster);

    assert!(fs.mkdir("/data/in").unwrap());
    fs.with_file("/data/in/a", OpenMode::Write, OpenOptions::default(), |f| {
        f.write(b"0123456789")
    })
    .unwrap();

    let listing = fs.list("/data").unwrap();
    assert_eq!(listing.len(), 1);
    assert!(listing[0].is_dir());
    assert_eq!(listing[0].file_name(), "in");

    assert!(fs.rename("/data/in/a", "/data/b").unwrap());
    assert!(fs.exists("/data/b").unwrap());
    assert!(!fs.exists("/data/in/a").unwrap());

    assert!(fs.truncate("/data/b", 4).unwrap());
    assert_eq!(fs.info("/data/b").unwrap().size, 4);
    assert!(!fs.truncate("/data/b", 40).unwrap());

    assert!(fs.set_replication("/data/b", 3).unwrap());
    assert_eq!(fs.info("/data/b").unwrap().replication, 3);

    assert!(fs.chmod("/data/b", 0o600).unwrap());
    assert_eq!(fs.info("/data/b").unwrap().mode_string(), "-rw-------");

    assert!(fs.chown("/data/b", Some("alice"), None).unwrap());
    assert!(fs.chown("/data/b", None, Some("staff")).unwrap());
    let info = fs.info("/data/b").unwrap();
    assert_eq!((info.owner.as_str(), info.group.as_str()), ("alice", "staff"));

    assert!(!fs.chmod("/missing", 0o600).unwrap());
}

#[test]
fn test_handles_on_separate_sessions() {
    let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
    let writer_fs = connect(&cluster);
    let reader_fs = connect(&cluster);
    assert_eq!(cluster.open_connections(), 2);

    let mut w = writer_fs
        .open("/shared", OpenMode::Write, OpenOptions::default())
        .unwrap();
    w.write(b"visible after flush").unwrap();
    assert_eq!(reader_fs.info("/shared").unwrap().size, 0);
    w.flush().unwrap();
    assert_eq!(
        read_all(&reader_fs, "/shared", 64),
        b"visible after flush".to_vec()
    );
    w.close().unwrap();
    drop(w);

    drop(writer_fs);
    drop(reader_fs);
    assert_eq!(cluster.open_connections(), 0);
}
