//! Core types for HDFS client operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HdfsError;

// ============= Open Flags =============

bitflags::bitflags! {
    /// Flags passed to the native open call (POSIX `fcntl.h` values)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        /// Open for writing
        const WRONLY = 0x0001;
        /// Open for reading and writing (not supported by HDFS)
        const RDWR = 0x0002;
        /// Append to an existing file
        const APPEND = 0x0400;
    }
}

impl OpenFlags {
    /// Read-only access is the absence of every write bit
    pub const RDONLY: OpenFlags = OpenFlags::empty();
}

/// Access mode of a file handle, fixed when the handle is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    /// Native open flags for this mode
    pub fn flags(self) -> OpenFlags {
        match self {
            OpenMode::Read => OpenFlags::RDONLY,
            OpenMode::Write => OpenFlags::WRONLY,
            OpenMode::Append => OpenFlags::WRONLY | OpenFlags::APPEND,
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::Append)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "read",
            OpenMode::Write => "write",
            OpenMode::Append => "append",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpenMode {
    type Err = HdfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read" => Ok(OpenMode::Read),
            "w" | "write" => Ok(OpenMode::Write),
            "a" | "append" => Ok(OpenMode::Append),
            _ => Err(HdfsError::InvalidArgument(format!("unknown open mode '{}'", s))),
        }
    }
}

/// State of a file handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    OpenForRead,
    OpenForWrite,
    OpenForAppend,
    Closed,
}

impl FileState {
    pub fn is_open(self) -> bool {
        self != FileState::Closed
    }
}

impl From<OpenMode> for FileState {
    fn from(mode: OpenMode) -> Self {
        match mode {
            OpenMode::Read => FileState::OpenForRead,
            OpenMode::Write => FileState::OpenForWrite,
            OpenMode::Append => FileState::OpenForAppend,
        }
    }
}

/// Options for [`FilesystemSession::open`](crate::FilesystemSession::open)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Number of replicas for files created by write/append (must be positive)
    pub replication: u16,
    /// Buffer size hint for the native stream (0 = layer default)
    pub buffer_size: u32,
    /// Block size for newly created files (0 = layer default)
    pub block_size: u64,
    /// Expected start position: seek target for reads, expected end of file
    /// for appends. Must be 0 for plain writes.
    pub start_offset: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            replication: 1,
            buffer_size: 0,
            block_size: 0,
            start_offset: 0,
        }
    }
}

impl OpenOptions {
    pub fn with_replication(mut self, replication: u16) -> Self {
        self.replication = replication;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_start_offset(mut self, start_offset: u64) -> Self {
        self.start_offset = start_offset;
        self
    }
}

// ============= Metadata =============

/// Kind of a namespace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::File => f.write_str("file"),
            FileKind::Directory => f.write_str("directory"),
        }
    }
}

/// Owned copy of the native path-info record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub kind: FileKind,
    /// Fully qualified name as reported by the namenode (`hdfs://host:port/path`)
    pub name: String,
    /// Last modification time, seconds since the epoch
    pub last_modified: i64,
    pub size: u64,
    pub replication: u16,
    pub block_size: u64,
    pub owner: String,
    pub group: String,
    /// Permission bits (`0o7777` mask)
    pub permissions: u16,
    /// Last access time, seconds since the epoch
    pub last_access: i64,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Path component of [`FileInfo::name`], without scheme and authority
    pub fn path(&self) -> &str {
        match self.name.find("://") {
            Some(scheme_end) => {
                let rest = &self.name[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
            }
            None => &self.name,
        }
    }

    /// Last path component (`"/"` for the root)
    pub fn file_name(&self) -> &str {
        let path = self.path();
        match path.trim_end_matches('/').rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => "/",
        }
    }

    /// `ls -l` style mode string, e.g. `drwxr-xr-x`
    pub fn mode_string(&self) -> String {
        let mut out = String::with_capacity(10);
        out.push(if self.is_dir() { 'd' } else { '-' });
        for shift in [6u16, 3, 0] {
            let bits = (self.permissions >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        if self.permissions & 0o1000 != 0 {
            let last = if out.ends_with('x') { 't' } else { 'T' };
            out.pop();
            out.push(last);
        }
        out
    }
}

/// Physical placement of one contiguous block of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    /// Datanodes holding a replica, in the order the namenode reported them
    pub hosts: Vec<String>,
    /// Byte offset of the block within the file
    pub offset: u64,
    /// Block length in bytes
    pub length: u64,
}

impl BlockLocation {
    /// One past the last byte of the block
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// An extra configuration parameter the native builder refused
///
/// Warnings never abort a connect; they are logged and kept on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub value: String,
    /// Native status returned by the builder
    pub code: i32,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Setting conf parameter {} failed (code {})",
            self.key, self.code
        )
    }
}
