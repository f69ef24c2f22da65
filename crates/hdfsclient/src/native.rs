//! Boundary to the native storage client
//!
//! [`NativeClient`] is the capability set the session and file handles call
//! into. It deliberately keeps the C conventions of libhdfs: calls report
//! failure with `None` or a `-1` status and leave the reason in
//! [`NativeClient::last_error`]. Translating those conventions into
//! [`HdfsError`](crate::HdfsError) is the job of the session layer, never of
//! an implementation.
//!
//! Implementations return owned copies of path-info and block-location
//! records; any native buffer behind them must already be released when the
//! call returns.

use crate::types::{BlockLocation, FileInfo, OpenFlags};

/// errno values used by the native layer
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EBADF: i32 = 9;
    pub const EEXIST: i32 = 17;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ENOTEMPTY: i32 = 39;
    pub const ENOTSUP: i32 = 95;
    pub const ECONNREFUSED: i32 = 111;
}

/// Native HDFS client capability set
///
/// `Builder`, `Fs` and `File` are opaque resources. `Fs` and `File` are
/// handed back to the implementation by value when they are released
/// (`disconnect`, `close_file`), so a released resource cannot be reused.
pub trait NativeClient {
    /// Connection builder
    type Builder;
    /// Connected filesystem handle
    type Fs;
    /// Open file handle
    type File;

    // ============= Builder =============

    fn new_builder(&self) -> Self::Builder;

    fn builder_set_namenode(&self, builder: &mut Self::Builder, host: &str);

    fn builder_set_namenode_port(&self, builder: &mut Self::Builder, port: u16);

    fn builder_set_user_name(&self, builder: &mut Self::Builder, user: &str);

    fn builder_set_kerb_ticket_cache_path(&self, builder: &mut Self::Builder, path: &str);

    fn builder_set_token(&self, builder: &mut Self::Builder, token: &str);

    /// Set an arbitrary configuration key; 0 on success
    fn builder_conf_set_str(&self, builder: &mut Self::Builder, key: &str, value: &str) -> i32;

    /// Connect, consuming the builder whether or not the connection succeeds
    fn builder_connect(&self, builder: Self::Builder) -> Option<Self::Fs>;

    fn disconnect(&self, fs: Self::Fs) -> i32;

    // ============= Files =============

    fn open_file(
        &self,
        fs: &Self::Fs,
        path: &str,
        flags: OpenFlags,
        buffer_size: i32,
        replication: i16,
        block_size: i64,
    ) -> Option<Self::File>;

    fn close_file(&self, fs: &Self::Fs, file: Self::File) -> i32;

    /// Read up to `buf.len()` bytes; bytes read, 0 at end of file, -1 on error
    fn read(&self, fs: &Self::Fs, file: &mut Self::File, buf: &mut [u8]) -> i32;

    /// Write `data`; bytes accepted or -1 on error
    fn write(&self, fs: &Self::Fs, file: &mut Self::File, data: &[u8]) -> i32;

    fn seek(&self, fs: &Self::Fs, file: &mut Self::File, pos: i64) -> i32;

    fn tell(&self, fs: &Self::Fs, file: &Self::File) -> i64;

    fn flush(&self, fs: &Self::Fs, file: &mut Self::File) -> i32;

    // ============= Metadata =============

    fn get_path_info(&self, fs: &Self::Fs, path: &str) -> Option<FileInfo>;

    fn list_directory(&self, fs: &Self::Fs, path: &str) -> Option<Vec<FileInfo>>;

    fn get_file_block_locations(
        &self,
        fs: &Self::Fs,
        path: &str,
        start: i64,
        length: i64,
    ) -> Option<Vec<BlockLocation>>;

    // ============= Namespace =============

    fn create_directory(&self, fs: &Self::Fs, path: &str) -> i32;

    fn rename(&self, fs: &Self::Fs, from: &str, to: &str) -> i32;

    fn delete(&self, fs: &Self::Fs, path: &str, recursive: bool) -> i32;

    /// 0 if `path` exists, -1 otherwise
    fn exists(&self, fs: &Self::Fs, path: &str) -> i32;

    fn truncate(&self, fs: &Self::Fs, path: &str, new_length: i64) -> i32;

    fn set_replication(&self, fs: &Self::Fs, path: &str, replication: i16) -> i32;

    fn chmod(&self, fs: &Self::Fs, path: &str, mode: i16) -> i32;

    /// `None` leaves the corresponding attribute unchanged
    fn chown(&self, fs: &Self::Fs, path: &str, owner: Option<&str>, group: Option<&str>) -> i32;

    /// errno-style code describing the most recent failure
    fn last_error(&self) -> i32;
}
