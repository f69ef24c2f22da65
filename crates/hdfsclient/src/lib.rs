//! HDFS client
//!
//! This crate provides a synchronous client for the Hadoop Distributed File
//! System: a [`FilesystemSession`] connected to a namenode, and
//! [`FileHandle`]s for streaming reads and writes.
//!
//! # Architecture
//!
//! - `FilesystemSession`: connection lifecycle, metadata and namespace operations
//! - `FileHandle`: one open file with a mode fixed at open time
//! - `NativeClient`: the boundary to the native client library
//! - `MiniCluster`: an in-memory cluster implementing `NativeClient`
//! - `LibHdfs3`: bindings to libhdfs3 (feature `libhdfs3`)
//!
//! # Example
//!
//! ```
//! use hdfsclient::{FilesystemSession, MiniCluster, MiniClusterConfig, OpenMode, OpenOptions, SessionConfig};
//!
//! # fn main() -> hdfsclient::Result<()> {
//! let cluster = MiniCluster::new(MiniClusterConfig::new("nn1", 9000));
//! let fs = FilesystemSession::new(cluster, SessionConfig::new("nn1"))?;
//!
//! fs.with_file("/t/hello", OpenMode::Write, OpenOptions::default(), |f| {
//!     f.write(b"hello")
//! })?;
//! assert_eq!(fs.info("/t/hello")?.size, 5);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod file;
#[cfg(feature = "libhdfs3")]
pub mod libhdfs3;
pub mod mini_cluster;
pub mod native;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::SessionConfig;
pub use error::{ErrorKind, HdfsError, Result};
pub use file::{FileHandle, MAX_READ_LEN};
#[cfg(feature = "libhdfs3")]
pub use libhdfs3::LibHdfs3;
pub use mini_cluster::{MiniCluster, MiniClusterConfig};
pub use native::NativeClient;
pub use session::FilesystemSession;
pub use types::{
    BlockLocation, ConfigWarning, FileInfo, FileKind, FileState, OpenFlags, OpenMode, OpenOptions,
};
