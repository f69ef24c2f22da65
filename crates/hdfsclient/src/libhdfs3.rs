//! libhdfs3 bindings
//!
//! [`LibHdfs3`] implements [`NativeClient`] by calling the C API of
//! libhdfs3 directly. Records returned by the library (path info, block
//! locations) are copied into owned Rust values and the native arrays are
//! released by guards before the call returns.
//!
//! errno is captured immediately after each failing call, before any
//! logging can clobber it.

use std::cell::Cell;
use std::ffi::{c_char, c_int, c_short, c_void, CStr, CString};
use std::io;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::native::{errno, NativeClient};
use crate::types::{BlockLocation, FileInfo, FileKind, OpenFlags};

#[allow(non_camel_case_types, non_snake_case)]
mod ffi {
    use std::ffi::{c_char, c_int, c_short, c_void};

    pub type hdfsFS = *mut c_void;
    pub type hdfsFile = *mut c_void;
    pub type tOffset = i64;
    pub type tSize = i32;
    pub type tTime = i64;
    pub type tPort = u16;

    #[repr(C)]
    pub struct hdfsBuilder {
        _private: [u8; 0],
    }

    #[repr(C)]
    pub struct hdfsFileInfo {
        pub mKind: c_int,
        pub mName: *mut c_char,
        pub mLastMod: tTime,
        pub mSize: tOffset,
        pub mReplication: c_short,
        pub mBlockSize: tOffset,
        pub mOwner: *mut c_char,
        pub mGroup: *mut c_char,
        pub mPermissions: c_short,
        pub mLastAccess: tTime,
    }

    #[repr(C)]
    pub struct BlockLocation {
        pub corrupt: c_int,
        pub numOfNodes: c_int,
        pub hosts: *mut *mut c_char,
        pub names: *mut *mut c_char,
        pub topologyPaths: *mut *mut c_char,
        pub length: tOffset,
        pub offset: tOffset,
    }

    pub const KIND_DIRECTORY: c_int = b'D' as c_int;

    #[link(name = "hdfs3")]
    extern "C" {
        pub fn hdfsNewBuilder() -> *mut hdfsBuilder;
        pub fn hdfsFreeBuilder(bld: *mut hdfsBuilder);
        pub fn hdfsBuilderSetNameNode(bld: *mut hdfsBuilder, nn: *const c_char);
        pub fn hdfsBuilderSetNameNodePort(bld: *mut hdfsBuilder, port: tPort);
        pub fn hdfsBuilderSetUserName(bld: *mut hdfsBuilder, user: *const c_char);
        pub fn hdfsBuilderSetKerbTicketCachePath(bld: *mut hdfsBuilder, path: *const c_char);
        pub fn hdfsBuilderSetToken(bld: *mut hdfsBuilder, token: *const c_char);
        pub fn hdfsBuilderConfSetStr(
            bld: *mut hdfsBuilder,
            key: *const c_char,
            val: *const c_char,
        ) -> c_int;
        pub fn hdfsBuilderConnect(bld: *mut hdfsBuilder) -> hdfsFS;
        pub fn hdfsDisconnect(fs: hdfsFS) -> c_int;

        pub fn hdfsOpenFile(
            fs: hdfsFS,
            path: *const c_char,
            flags: c_int,
            buffer_size: c_int,
            replication: c_short,
            blocksize: tOffset,
        ) -> hdfsFile;
        pub fn hdfsCloseFile(fs: hdfsFS, file: hdfsFile) -> c_int;
        pub fn hdfsRead(fs: hdfsFS, file: hdfsFile, buffer: *mut c_void, length: tSize) -> tSize;
        pub fn hdfsWrite(
            fs: hdfsFS,
            file: hdfsFile,
            buffer: *const c_void,
            length: tSize,
        ) -> tSize;
        pub fn hdfsSeek(fs: hdfsFS, file: hdfsFile, desired_pos: tOffset) -> c_int;
        pub fn hdfsTell(fs: hdfsFS, file: hdfsFile) -> tOffset;
        pub fn hdfsFlush(fs: hdfsFS, file: hdfsFile) -> c_int;

        pub fn hdfsGetPathInfo(fs: hdfsFS, path: *const c_char) -> *mut hdfsFileInfo;
        pub fn hdfsListDirectory(
            fs: hdfsFS,
            path: *const c_char,
            num_entries: *mut c_int,
        ) -> *mut hdfsFileInfo;
        pub fn hdfsFreeFileInfo(info: *mut hdfsFileInfo, num_entries: c_int);
        pub fn hdfsGetFileBlockLocations(
            fs: hdfsFS,
            path: *const c_char,
            start: tOffset,
            length: tOffset,
            num_of_block: *mut c_int,
        ) -> *mut BlockLocation;
        pub fn hdfsFreeFileBlockLocations(locations: *mut BlockLocation, num_of_block: c_int);

        pub fn hdfsCreateDirectory(fs: hdfsFS, path: *const c_char) -> c_int;
        pub fn hdfsRename(fs: hdfsFS, old_path: *const c_char, new_path: *const c_char) -> c_int;
        pub fn hdfsDelete(fs: hdfsFS, path: *const c_char, recursive: c_int) -> c_int;
        pub fn hdfsExists(fs: hdfsFS, path: *const c_char) -> c_int;
        pub fn hdfsTruncate(
            fs: hdfsFS,
            path: *const c_char,
            pos: tOffset,
            should_wait: *mut c_int,
        ) -> c_int;
        pub fn hdfsSetReplication(fs: hdfsFS, path: *const c_char, replication: i16) -> c_int;
        pub fn hdfsChmod(fs: hdfsFS, path: *const c_char, mode: c_short) -> c_int;
        pub fn hdfsChown(
            fs: hdfsFS,
            path: *const c_char,
            owner: *const c_char,
            group: *const c_char,
        ) -> c_int;
    }
}

/// Builder handle; strings handed to the library live as long as the builder
pub struct LibHdfs3Builder {
    ptr: Option<NonNull<ffi::hdfsBuilder>>,
    strings: Vec<CString>,
}

impl LibHdfs3Builder {
    fn keep(&mut self, value: &str) -> Option<*const c_char> {
        let value = CString::new(value).ok()?;
        let raw = value.as_ptr();
        self.strings.push(value);
        Some(raw)
    }
}

impl Drop for LibHdfs3Builder {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            unsafe { ffi::hdfsFreeBuilder(ptr.as_ptr()) };
        }
    }
}

/// Connected filesystem
pub struct LibHdfs3Fs(NonNull<c_void>);

/// Open file
pub struct LibHdfs3File(NonNull<c_void>);

/// Frees a native path-info array on drop
struct FileInfoArray {
    ptr: *mut ffi::hdfsFileInfo,
    len: c_int,
}

impl FileInfoArray {
    fn entries(&self) -> &[ffi::hdfsFileInfo] {
        if self.ptr.is_null() || self.len <= 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len as usize) }
    }
}

impl Drop for FileInfoArray {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { ffi::hdfsFreeFileInfo(self.ptr, self.len) };
        }
    }
}

/// Frees a native block-location array on drop
struct BlockArray {
    ptr: *mut ffi::BlockLocation,
    len: c_int,
}

impl BlockArray {
    fn entries(&self) -> &[ffi::BlockLocation] {
        if self.ptr.is_null() || self.len <= 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.len as usize) }
    }
}

impl Drop for BlockArray {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { ffi::hdfsFreeFileBlockLocations(self.ptr, self.len) };
        }
    }
}

/// Copy a possibly null C string
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn owned_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn convert_info(raw: &ffi::hdfsFileInfo) -> FileInfo {
    unsafe {
        FileInfo {
            kind: if raw.mKind == ffi::KIND_DIRECTORY {
                FileKind::Directory
            } else {
                FileKind::File
            },
            name: owned_string(raw.mName),
            last_modified: raw.mLastMod,
            size: raw.mSize.max(0) as u64,
            replication: raw.mReplication.max(0) as u16,
            block_size: raw.mBlockSize.max(0) as u64,
            owner: owned_string(raw.mOwner),
            group: owned_string(raw.mGroup),
            permissions: (raw.mPermissions as u16) & 0o7777,
            last_access: raw.mLastAccess,
        }
    }
}

fn convert_block(raw: &ffi::BlockLocation) -> BlockLocation {
    let hosts = if raw.hosts.is_null() || raw.numOfNodes <= 0 {
        Vec::new()
    } else {
        unsafe {
            std::slice::from_raw_parts(raw.hosts, raw.numOfNodes as usize)
                .iter()
                .map(|host| owned_string(*host))
                .collect()
        }
    };
    BlockLocation {
        hosts,
        offset: raw.offset.max(0) as u64,
        length: raw.length.max(0) as u64,
    }
}

/// Native client backed by libhdfs3
///
/// Not `Sync`: the last error is tracked per client value.
#[derive(Debug, Default)]
pub struct LibHdfs3 {
    last_error: Cell<i32>,
}

impl LibHdfs3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record errno after a failed call
    fn capture_errno(&self) {
        let code = io::Error::last_os_error()
            .raw_os_error()
            .filter(|code| *code != 0)
            .unwrap_or(errno::EIO);
        self.last_error.set(code);
    }

    fn status(&self, ret: c_int) -> i32 {
        if ret != 0 {
            self.capture_errno();
        }
        ret
    }

    fn c_path(&self, path: &str) -> Option<CString> {
        match CString::new(path) {
            Ok(path) => Some(path),
            Err(_) => {
                self.last_error.set(errno::EINVAL);
                None
            }
        }
    }

    /// Run `call` with `path` as a C string; -1 if the path has a NUL byte
    fn with_path(&self, path: &str, call: impl FnOnce(*const c_char) -> c_int) -> i32 {
        match self.c_path(path) {
            Some(path) => self.status(call(path.as_ptr())),
            None => -1,
        }
    }
}

impl NativeClient for LibHdfs3 {
    type Builder = LibHdfs3Builder;
    type Fs = LibHdfs3Fs;
    type File = LibHdfs3File;

    fn new_builder(&self) -> LibHdfs3Builder {
        LibHdfs3Builder {
            ptr: NonNull::new(unsafe { ffi::hdfsNewBuilder() }),
            strings: Vec::new(),
        }
    }

    fn builder_set_namenode(&self, builder: &mut LibHdfs3Builder, host: &str) {
        if let (Some(ptr), Some(host)) = (builder.ptr, builder.keep(host)) {
            unsafe { ffi::hdfsBuilderSetNameNode(ptr.as_ptr(), host) };
        }
    }

    fn builder_set_namenode_port(&self, builder: &mut LibHdfs3Builder, port: u16) {
        if let Some(ptr) = builder.ptr {
            unsafe { ffi::hdfsBuilderSetNameNodePort(ptr.as_ptr(), port) };
        }
    }

    fn builder_set_user_name(&self, builder: &mut LibHdfs3Builder, user: &str) {
        if let (Some(ptr), Some(user)) = (builder.ptr, builder.keep(user)) {
            unsafe { ffi::hdfsBuilderSetUserName(ptr.as_ptr(), user) };
        }
    }

    fn builder_set_kerb_ticket_cache_path(&self, builder: &mut LibHdfs3Builder, path: &str) {
        if let (Some(ptr), Some(path)) = (builder.ptr, builder.keep(path)) {
            unsafe { ffi::hdfsBuilderSetKerbTicketCachePath(ptr.as_ptr(), path) };
        }
    }

    fn builder_set_token(&self, builder: &mut LibHdfs3Builder, token: &str) {
        if let (Some(ptr), Some(token)) = (builder.ptr, builder.keep(token)) {
            unsafe { ffi::hdfsBuilderSetToken(ptr.as_ptr(), token) };
        }
    }

    fn builder_conf_set_str(&self, builder: &mut LibHdfs3Builder, key: &str, value: &str) -> i32 {
        let Some(ptr) = builder.ptr else {
            self.last_error.set(errno::EINVAL);
            return -1;
        };
        match (builder.keep(key), builder.keep(value)) {
            (Some(key), Some(value)) => {
                self.status(unsafe { ffi::hdfsBuilderConfSetStr(ptr.as_ptr(), key, value) })
            }
            _ => {
                self.last_error.set(errno::EINVAL);
                -1
            }
        }
    }

    fn builder_connect(&self, builder: LibHdfs3Builder) -> Option<LibHdfs3Fs> {
        // The library frees the builder whether or not the connection succeeds
        let mut builder = ManuallyDrop::new(builder);
        let Some(ptr) = builder.ptr.take() else {
            self.last_error.set(errno::EINVAL);
            return None;
        };
        let fs = unsafe { ffi::hdfsBuilderConnect(ptr.as_ptr()) };
        drop(std::mem::take(&mut builder.strings));

        match NonNull::new(fs) {
            Some(fs) => Some(LibHdfs3Fs(fs)),
            None => {
                self.capture_errno();
                debug!("hdfsBuilderConnect failed with errno {}", self.last_error.get());
                None
            }
        }
    }

    fn disconnect(&self, fs: LibHdfs3Fs) -> i32 {
        self.status(unsafe { ffi::hdfsDisconnect(fs.0.as_ptr()) })
    }

    fn open_file(
        &self,
        fs: &LibHdfs3Fs,
        path: &str,
        flags: OpenFlags,
        buffer_size: i32,
        replication: i16,
        block_size: i64,
    ) -> Option<LibHdfs3File> {
        let path = self.c_path(path)?;
        let file = unsafe {
            ffi::hdfsOpenFile(
                fs.0.as_ptr(),
                path.as_ptr(),
                flags.bits(),
                buffer_size,
                replication as c_short,
                block_size,
            )
        };
        let file = NonNull::new(file).map(LibHdfs3File);
        if file.is_none() {
            self.capture_errno();
        }
        file
    }

    fn close_file(&self, fs: &LibHdfs3Fs, file: LibHdfs3File) -> i32 {
        self.status(unsafe { ffi::hdfsCloseFile(fs.0.as_ptr(), file.0.as_ptr()) })
    }

    fn read(&self, fs: &LibHdfs3Fs, file: &mut LibHdfs3File, buf: &mut [u8]) -> i32 {
        let len = buf.len().min(i32::MAX as usize) as i32;
        let ret = unsafe {
            ffi::hdfsRead(
                fs.0.as_ptr(),
                file.0.as_ptr(),
                buf.as_mut_ptr().cast(),
                len,
            )
        };
        if ret < 0 {
            self.capture_errno();
        }
        ret
    }

    fn write(&self, fs: &LibHdfs3Fs, file: &mut LibHdfs3File, data: &[u8]) -> i32 {
        let len = data.len().min(i32::MAX as usize) as i32;
        let ret = unsafe {
            ffi::hdfsWrite(fs.0.as_ptr(), file.0.as_ptr(), data.as_ptr().cast(), len)
        };
        if ret < 0 {
            self.capture_errno();
        }
        ret
    }

    fn seek(&self, fs: &LibHdfs3Fs, file: &mut LibHdfs3File, pos: i64) -> i32 {
        self.status(unsafe { ffi::hdfsSeek(fs.0.as_ptr(), file.0.as_ptr(), pos) })
    }

    fn tell(&self, fs: &LibHdfs3Fs, file: &LibHdfs3File) -> i64 {
        let pos = unsafe { ffi::hdfsTell(fs.0.as_ptr(), file.0.as_ptr()) };
        if pos < 0 {
            self.capture_errno();
        }
        pos
    }

    fn flush(&self, fs: &LibHdfs3Fs, file: &mut LibHdfs3File) -> i32 {
        self.status(unsafe { ffi::hdfsFlush(fs.0.as_ptr(), file.0.as_ptr()) })
    }

    fn get_path_info(&self, fs: &LibHdfs3Fs, path: &str) -> Option<FileInfo> {
        let path = self.c_path(path)?;
        let array = FileInfoArray {
            ptr: unsafe { ffi::hdfsGetPathInfo(fs.0.as_ptr(), path.as_ptr()) },
            len: 1,
        };
        if array.ptr.is_null() {
            self.capture_errno();
            return None;
        }
        array.entries().first().map(convert_info)
    }

    fn list_directory(&self, fs: &LibHdfs3Fs, path: &str) -> Option<Vec<FileInfo>> {
        let path = self.c_path(path)?;
        let mut len: c_int = 0;
        // Clear errno so an empty directory (NULL with errno 0) is distinguishable
        set_errno(0);
        let array = FileInfoArray {
            ptr: unsafe { ffi::hdfsListDirectory(fs.0.as_ptr(), path.as_ptr(), &mut len) },
            len,
        };
        if array.ptr.is_null() {
            if io::Error::last_os_error().raw_os_error() == Some(0) {
                return Some(Vec::new());
            }
            self.capture_errno();
            return None;
        }
        Some(array.entries().iter().map(convert_info).collect())
    }

    fn get_file_block_locations(
        &self,
        fs: &LibHdfs3Fs,
        path: &str,
        start: i64,
        length: i64,
    ) -> Option<Vec<BlockLocation>> {
        let path = self.c_path(path)?;
        let mut len: c_int = 0;
        let array = BlockArray {
            ptr: unsafe {
                ffi::hdfsGetFileBlockLocations(
                    fs.0.as_ptr(),
                    path.as_ptr(),
                    start,
                    length,
                    &mut len,
                )
            },
            len,
        };
        if array.ptr.is_null() {
            if len == 0 && io::Error::last_os_error().raw_os_error() == Some(0) {
                return Some(Vec::new());
            }
            self.capture_errno();
            return None;
        }
        Some(array.entries().iter().map(convert_block).collect())
    }

    fn create_directory(&self, fs: &LibHdfs3Fs, path: &str) -> i32 {
        self.with_path(path, |path| unsafe {
            ffi::hdfsCreateDirectory(fs.0.as_ptr(), path)
        })
    }

    fn rename(&self, fs: &LibHdfs3Fs, from: &str, to: &str) -> i32 {
        let Some(to) = self.c_path(to) else {
            return -1;
        };
        self.with_path(from, |from| unsafe {
            ffi::hdfsRename(fs.0.as_ptr(), from, to.as_ptr())
        })
    }

    fn delete(&self, fs: &LibHdfs3Fs, path: &str, recursive: bool) -> i32 {
        self.with_path(path, |path| unsafe {
            ffi::hdfsDelete(fs.0.as_ptr(), path, recursive as c_int)
        })
    }

    fn exists(&self, fs: &LibHdfs3Fs, path: &str) -> i32 {
        self.with_path(path, |path| unsafe { ffi::hdfsExists(fs.0.as_ptr(), path) })
    }

    fn truncate(&self, fs: &LibHdfs3Fs, path: &str, new_length: i64) -> i32 {
        let mut should_wait: c_int = 0;
        let ret = self.with_path(path, |path| unsafe {
            ffi::hdfsTruncate(fs.0.as_ptr(), path, new_length, &mut should_wait)
        });
        if ret == 0 && should_wait != 0 {
            debug!("Truncate accepted, block recovery still in progress");
        }
        ret
    }

    fn set_replication(&self, fs: &LibHdfs3Fs, path: &str, replication: i16) -> i32 {
        self.with_path(path, |path| unsafe {
            ffi::hdfsSetReplication(fs.0.as_ptr(), path, replication)
        })
    }

    fn chmod(&self, fs: &LibHdfs3Fs, path: &str, mode: i16) -> i32 {
        self.with_path(path, |path| unsafe {
            ffi::hdfsChmod(fs.0.as_ptr(), path, mode as c_short)
        })
    }

    fn chown(&self, fs: &LibHdfs3Fs, path: &str, owner: Option<&str>, group: Option<&str>) -> i32 {
        let owner = match owner.map(|o| self.c_path(o)) {
            Some(None) => return -1,
            Some(Some(owner)) => Some(owner),
            None => None,
        };
        let group = match group.map(|g| self.c_path(g)) {
            Some(None) => return -1,
            Some(Some(group)) => Some(group),
            None => None,
        };
        let owner_ptr = owner.as_ref().map_or(ptr::null(), |o| o.as_ptr());
        let group_ptr = group.as_ref().map_or(ptr::null(), |g| g.as_ptr());
        self.with_path(path, |path| unsafe {
            ffi::hdfsChown(fs.0.as_ptr(), path, owner_ptr, group_ptr)
        })
    }

    fn last_error(&self) -> i32 {
        self.last_error.get()
    }
}

#[cfg(target_os = "linux")]
fn set_errno(value: c_int) {
    extern "C" {
        fn __errno_location() -> *mut c_int;
    }
    unsafe { *__errno_location() = value };
}

#[cfg(target_os = "macos")]
fn set_errno(value: c_int) {
    extern "C" {
        fn __error() -> *mut c_int;
    }
    unsafe { *__error() = value };
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn set_errno(_value: c_int) {}
