//! HDFS command-line tool
//!
//! A small filesystem shell on top of `hdfsclient`.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use hdfsclient::{
    BlockLocation, FileInfo, FilesystemSession, MiniCluster, MiniClusterConfig, NativeClient,
    OpenMode, OpenOptions, SessionConfig,
};
use hdfsconfig::HdfsConfig;
use rand::RngCore;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const BENCH_CHUNK: usize = 64 * 1024;
const MIB: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "hdfs")]
#[command(about = "HDFS filesystem client", long_about = None)]
struct Cli {
    /// Client configuration file path
    #[arg(
        short = 'c',
        long,
        env = "HDFS_CONF",
        default_value = "/etc/hadoop/conf/hdfs-client.conf"
    )]
    conf: String,

    /// Namenode host
    /// If not specified, will be read from the configuration file
    #[arg(long, env = "HDFS_NAMENODE")]
    host: Option<String>,

    /// Namenode port
    #[arg(long)]
    port: Option<u16>,

    /// User to connect as
    #[arg(short, long)]
    user: Option<String>,

    /// Run against an in-process cluster instead of a real namenode
    #[arg(long)]
    in_memory: bool,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print metadata as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show metadata for a path
    Stat { path: String },
    /// Create a directory and its parents
    Mkdir { path: String },
    /// Remove a file or directory
    Rm {
        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,
        path: String,
    },
    /// Rename a file or directory
    Mv { from: String, to: String },
    /// Copy a local file (or stdin) into HDFS
    Put {
        /// Input file ("-" for stdin)
        local: String,
        /// Destination path
        remote: String,
        /// Replication factor of the new file
        #[arg(short, long)]
        replication: Option<u16>,
        /// Append instead of overwriting
        #[arg(short, long)]
        append: bool,
    },
    /// Copy an HDFS file to a local file (or stdout)
    Get {
        /// Source path
        remote: String,
        /// Output file ("-" for stdout)
        local: String,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Show which datanodes hold the blocks of a file
    Locations {
        path: String,
        #[arg(long, default_value = "0")]
        start: u64,
        /// Length of the range (default: to end of file)
        #[arg(long)]
        length: Option<u64>,
    },
    /// Change permission bits (octal, e.g. 755)
    Chmod { mode: String, path: String },
    /// Change owner and/or group (OWNER, OWNER:GROUP or :GROUP)
    Chown { owner: String, path: String },
    /// Change the replication factor of a file
    Setrep { replication: u16, path: String },
    /// Shrink a file
    Truncate { length: u64, path: String },
    /// Exit with status 0 if the path exists
    Test {
        #[arg(short = 'e', long = "exists")]
        exists: bool,
        path: String,
    },
    /// Write a file, read it back in 64 KiB chunks and report throughput
    Bench {
        /// Amount of data to write, in MiB
        #[arg(long, default_value = "64")]
        size_mib: usize,
        /// Scratch file (removed afterwards)
        #[arg(long, default_value = "/tmp/hdfs-bench")]
        path: String,
        /// Replication factor of the scratch file
        #[arg(short, long)]
        replication: Option<u16>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (session_config, open_options) = load_config(&cli)?;
    let deadline = cli.timeout.map(Duration::from_secs);

    run_with_deadline(deadline, move || run(cli, session_config, open_options))
}

/// Run blocking `work` on a worker thread, giving up once `deadline` passes
///
/// On timeout the runtime is shut down without waiting, so a worker stuck in
/// a native call cannot keep the process alive.
fn run_with_deadline<T, F>(deadline: Option<Duration>, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let task = runtime.spawn_blocking(work);
    let outcome = runtime.block_on(async move {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| anyhow!("Timed out after {:?}", limit)),
            None => Ok(task.await),
        }
    });

    match outcome {
        Ok(joined) => joined.context("Worker task failed")?,
        Err(err) => {
            runtime.shutdown_background();
            Err(err)
        }
    }
}

/// Resolve session and open options (flags > config file > defaults)
fn load_config(cli: &Cli) -> Result<(SessionConfig, OpenOptions)> {
    let file_config = if Path::new(&cli.conf).exists() {
        debug!("Loading configuration from: {}", cli.conf);
        Some(HdfsConfig::from_file(&cli.conf).context("Failed to parse client config")?)
    } else {
        debug!("Configuration file not found: {}", cli.conf);
        None
    };

    let (mut session, options) = match (&file_config, &cli.host) {
        (Some(config), _) => (
            SessionConfig::from_hdfs_config(config).context("Invalid client config")?,
            OpenOptions::from_hdfs_config(config).context("Invalid client config")?,
        ),
        (None, Some(host)) => (SessionConfig::new(host.clone()), OpenOptions::default()),
        (None, None) if cli.in_memory => {
            (SessionConfig::new("localhost"), OpenOptions::default())
        }
        (None, None) => {
            return Err(anyhow!(
                "Namenode not specified. Use --host or provide a valid client config"
            ))
        }
    };

    if let Some(host) = &cli.host {
        session.host = host.clone();
    }
    if let Some(port) = cli.port {
        session.port = port;
    }
    if let Some(user) = &cli.user {
        session.user = Some(user.clone());
    }
    session.autoconnect = true;

    Ok((session, options))
}

fn run(cli: Cli, config: SessionConfig, options: OpenOptions) -> Result<ExitCode> {
    if cli.in_memory {
        let cluster = MiniCluster::new(MiniClusterConfig::new(config.host.clone(), config.port));
        return execute(cluster, config, options, cli.command, cli.json);
    }
    run_native(config, options, cli.command, cli.json)
}

#[cfg(feature = "libhdfs3")]
fn run_native(
    config: SessionConfig,
    options: OpenOptions,
    command: Commands,
    json: bool,
) -> Result<ExitCode> {
    execute(hdfsclient::LibHdfs3::new(), config, options, command, json)
}

#[cfg(not(feature = "libhdfs3"))]
fn run_native(
    _config: SessionConfig,
    _options: OpenOptions,
    _command: Commands,
    _json: bool,
) -> Result<ExitCode> {
    bail!("Built without libhdfs3 support; rebuild with --features libhdfs3 or use --in-memory")
}

fn execute<C: NativeClient>(
    client: C,
    config: SessionConfig,
    options: OpenOptions,
    command: Commands,
    json: bool,
) -> Result<ExitCode> {
    info!("Connecting to {}", config.endpoint());
    let fs = FilesystemSession::new(client, config).context("Failed to connect")?;
    for warning in fs.config_warnings() {
        eprintln!("warning: {}", warning);
    }

    match command {
        Commands::Ls { path } => {
            let entries = fs
                .list(&path)
                .with_context(|| format!("Failed to list {}", path))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}", format_entry(entry));
                }
            }
        }
        Commands::Stat { path } => {
            let info = fs
                .info(&path)
                .with_context(|| format!("Failed to stat {}", path))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_stat(&info);
            }
        }
        Commands::Mkdir { path } => check(fs.mkdir(&path)?, "mkdir", &path)?,
        Commands::Rm { recursive, path } => check(fs.remove(&path, recursive)?, "rm", &path)?,
        Commands::Mv { from, to } => check(fs.rename(&from, &to)?, "mv", &from)?,
        Commands::Put {
            local,
            remote,
            replication,
            append,
        } => {
            let mut input = open_input(&local)?;
            let mode = if append {
                OpenMode::Append
            } else {
                OpenMode::Write
            };
            let options = with_replication(options, replication);
            let copied = fs.with_file(&remote, mode, options, |f| {
                io::copy(&mut input, f).context("Failed to copy data")
            })?;
            debug!("Wrote {} bytes to {}", copied, remote);
        }
        Commands::Get { remote, local } => {
            let mut output = open_output(&local)?;
            let copied = fs.with_file(&remote, OpenMode::Read, options, |f| {
                io::copy(f, &mut output).context("Failed to copy data")
            })?;
            output.flush().context("Failed to flush output")?;
            debug!("Read {} bytes from {}", copied, remote);
        }
        Commands::Cat { path } => {
            let mut stdout = io::stdout().lock();
            fs.with_file(&path, OpenMode::Read, options, |f| {
                io::copy(f, &mut stdout).context("Failed to write to stdout")
            })?;
            stdout.flush().context("Failed to flush stdout")?;
        }
        Commands::Locations {
            path,
            start,
            length,
        } => {
            let blocks = fs
                .get_block_locations(&path, start, length)
                .with_context(|| format!("Failed to get block locations for {}", path))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else {
                for block in &blocks {
                    println!("{}", format_block(block));
                }
            }
        }
        Commands::Chmod { mode, path } => {
            let mode = u16::from_str_radix(&mode, 8)
                .with_context(|| format!("Invalid octal mode '{}'", mode))?;
            check(fs.chmod(&path, mode)?, "chmod", &path)?;
        }
        Commands::Chown { owner, path } => {
            let (owner, group) = parse_owner(&owner);
            check(fs.chown(&path, owner, group)?, "chown", &path)?;
        }
        Commands::Setrep { replication, path } => {
            check(fs.set_replication(&path, replication)?, "setrep", &path)?
        }
        Commands::Truncate { length, path } => {
            check(fs.truncate(&path, length)?, "truncate", &path)?
        }
        Commands::Test { exists, path } => {
            if !exists {
                bail!("test needs -e");
            }
            return Ok(if fs.exists(&path)? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Commands::Bench {
            size_mib,
            path,
            replication,
        } => bench(&fs, &path, size_mib, with_replication(options, replication), json)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn with_replication(options: OpenOptions, replication: Option<u16>) -> OpenOptions {
    match replication {
        Some(replication) => options.with_replication(replication),
        None => options,
    }
}

/// Turn a `false` status from a namespace operation into an error
fn check(ok: bool, op: &str, path: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(anyhow!("{}: {} failed", op, path))
    }
}

fn parse_owner(owner_group: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> {
        (!s.is_empty()).then_some(s)
    }
    match owner_group.split_once(':') {
        Some((owner, group)) => (non_empty(owner), non_empty(group)),
        None => (non_empty(owner_group), None),
    }
}

fn format_entry(info: &FileInfo) -> String {
    let replication = if info.is_dir() {
        "-".to_string()
    } else {
        info.replication.to_string()
    };
    format!(
        "{} {:>3} {:<10} {:<10} {:>12} {:>10} {}",
        info.mode_string(),
        replication,
        info.owner,
        info.group,
        info.size,
        info.last_modified,
        info.path()
    )
}

fn print_stat(info: &FileInfo) {
    println!("  Path: {}", info.path());
    println!("  Type: {}", info.kind);
    println!("  Size: {}", info.size);
    println!("  Mode: {} ({:04o})", info.mode_string(), info.permissions);
    println!(" Owner: {}:{}", info.owner, info.group);
    if info.is_file() {
        println!(" Repl.: {}", info.replication);
        println!(" Block: {}", info.block_size);
    }
    println!("Modify: {}", info.last_modified);
    println!("Access: {}", info.last_access);
}

fn format_block(block: &BlockLocation) -> String {
    format!(
        "{:>12} {:>12} {}",
        block.offset,
        block.length,
        block.hosts.join(",")
    )
}

/// Read input from file or stdin
fn open_input(file: &str) -> Result<Box<dyn Read>> {
    if file == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        let f = std::fs::File::open(file).with_context(|| format!("Failed to read file: {}", file))?;
        Ok(Box::new(f))
    }
}

/// Write output to file or stdout
fn open_output(file: &str) -> Result<Box<dyn Write>> {
    if file == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        let f = std::fs::File::create(file)
            .with_context(|| format!("Failed to write file: {}", file))?;
        Ok(Box::new(io::BufWriter::new(f)))
    }
}

fn bench<C: NativeClient>(
    fs: &FilesystemSession<C>,
    path: &str,
    size_mib: usize,
    options: OpenOptions,
    json: bool,
) -> Result<()> {
    let mut chunk = vec![0u8; MIB];
    rand::thread_rng().fill_bytes(&mut chunk);
    let total = size_mib * MIB;

    let started = Instant::now();
    fs.with_file(path, OpenMode::Write, options, |f| {
        for _ in 0..size_mib {
            f.write(&chunk)?;
        }
        Ok::<_, anyhow::Error>(())
    })
    .with_context(|| format!("Failed to write {}", path))?;
    let write_time = started.elapsed();

    let started = Instant::now();
    let read = fs
        .with_file(path, OpenMode::Read, OpenOptions::default(), |f| {
            let mut read = 0usize;
            loop {
                let data = f.read(BENCH_CHUNK)?;
                if data.is_empty() {
                    break;
                }
                let matches = data
                    .iter()
                    .enumerate()
                    .all(|(i, byte)| *byte == chunk[(read + i) % MIB]);
                if !matches {
                    bail!("Data mismatch near offset {}", read);
                }
                read += data.len();
            }
            Ok::<_, anyhow::Error>(read)
        })
        .with_context(|| format!("Failed to read back {}", path))?;
    let read_time = started.elapsed();

    if read != total {
        bail!("Read back {} bytes, wrote {}", read, total);
    }

    let blocks = fs.get_block_locations(path, 0, None)?;
    if !fs.remove(path, false)? {
        eprintln!("warning: failed to remove {}", path);
    }

    let throughput = |elapsed: Duration| size_mib as f64 / elapsed.as_secs_f64().max(1e-9);
    if json {
        let report = serde_json::json!({
            "path": path,
            "bytes": total,
            "write_secs": write_time.as_secs_f64(),
            "read_secs": read_time.as_secs_f64(),
            "blocks": blocks,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "write: {} MiB in {:.3}s ({:.1} MiB/s)",
            size_mib,
            write_time.as_secs_f64(),
            throughput(write_time)
        );
        println!(
            "read:  {} MiB in {:.3}s ({:.1} MiB/s)",
            size_mib,
            read_time.as_secs_f64(),
            throughput(read_time)
        );
        println!("blocks:");
        for block in &blocks {
            println!("{}", format_block(block));
        }
    }

    Ok(())
}
