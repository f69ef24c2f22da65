//! Filesystem session
//!
//! A [`FilesystemSession`] owns at most one native connection to a namenode.
//! It answers metadata queries, applies namespace mutations and opens
//! [`FileHandle`]s, which borrow the session for as long as they live.
//!
//! ## Status-code operations
//!
//! The namespace mutators (`mkdir`, `rename`, `remove`, `exists`,
//! `truncate`, `set_replication`, `chmod`, `chown`) keep the native
//! status-code contract: `Ok(true)` on success and `Ok(false)` when the
//! native layer reports failure. `Err` is reserved for preconditions the
//! session can check itself (not connected, out-of-range arguments).

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{HdfsError, Result};
use crate::file::FileHandle;
use crate::native::{errno, NativeClient};
use crate::types::{BlockLocation, ConfigWarning, FileInfo, OpenMode, OpenOptions};

/// A connection to an HDFS namenode
pub struct FilesystemSession<C: NativeClient> {
    client: C,
    config: SessionConfig,
    connection: Option<C::Fs>,
    /// Extra parameters the builder refused during the last connect
    warnings: Vec<ConfigWarning>,
}

impl<C: NativeClient> FilesystemSession<C> {
    /// Create a session, connecting immediately if `config.autoconnect` is set
    ///
    /// With autoconnect, a connection failure fails construction: no
    /// half-built session is returned.
    pub fn new(client: C, config: SessionConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(HdfsError::InvalidArgument(
                "namenode host must not be empty".to_string(),
            ));
        }

        let mut session = Self {
            client,
            config,
            connection: None,
            warnings: Vec::new(),
        };

        if session.config.autoconnect {
            session.connect()?;
        }

        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Extra parameters that failed to apply during the last `connect`
    pub fn config_warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// The native client this session calls into
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Establish the connection to the namenode
    ///
    /// Fails with [`HdfsError::AlreadyConnected`] if a connection is live.
    /// Optional settings are applied one by one; a refused extra parameter
    /// becomes a [`ConfigWarning`] instead of aborting the connect.
    pub fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Err(HdfsError::AlreadyConnected(self.config.endpoint()));
        }

        info!("Connecting to namenode {}", self.config.endpoint());

        let mut builder = self.client.new_builder();
        self.client
            .builder_set_namenode_port(&mut builder, self.config.port);
        self.client
            .builder_set_namenode(&mut builder, &self.config.host);
        if let Some(user) = &self.config.user {
            self.client.builder_set_user_name(&mut builder, user);
        }
        if let Some(ticket_cache) = &self.config.ticket_cache {
            self.client
                .builder_set_kerb_ticket_cache_path(&mut builder, ticket_cache);
        }
        if let Some(token) = &self.config.token {
            self.client.builder_set_token(&mut builder, token);
        }

        let mut warnings = Vec::new();
        for (key, value) in &self.config.extra_params {
            let code = self.client.builder_conf_set_str(&mut builder, key, value);
            if code != 0 {
                let warning = ConfigWarning {
                    key: key.clone(),
                    value: value.clone(),
                    code,
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
        self.warnings = warnings;

        match self.client.builder_connect(builder) {
            Some(fs) => {
                info!("Connected to namenode {}", self.config.endpoint());
                self.connection = Some(fs);
                Ok(())
            }
            None => Err(HdfsError::Connection {
                endpoint: self.config.endpoint(),
                code: self.client.last_error(),
            }),
        }
    }

    /// Release the connection; a no-op when not connected
    pub fn disconnect(&mut self) {
        if let Some(fs) = self.connection.take() {
            info!("Disconnecting from namenode {}", self.config.endpoint());
            if self.client.disconnect(fs) != 0 {
                warn!(
                    "Native disconnect from {} reported code {}",
                    self.config.endpoint(),
                    self.client.last_error()
                );
            }
        }
    }

    /// Live connection, or [`HdfsError::NotConnected`]
    pub(crate) fn connection(&self) -> Result<&C::Fs> {
        self.connection.as_ref().ok_or(HdfsError::NotConnected)
    }

    /// Open `path` for reading, writing or appending
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use hdfsclient::{FilesystemSession, MiniCluster, OpenMode, OpenOptions, SessionConfig};
    /// # fn example(fs: &FilesystemSession<MiniCluster>) -> hdfsclient::Result<()> {
    /// let mut f = fs.open("/t/f", OpenMode::Write, OpenOptions::default())?;
    /// f.write(b"hello")?;
    /// f.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(
        &self,
        path: &str,
        mode: OpenMode,
        options: OpenOptions,
    ) -> Result<FileHandle<'_, C>> {
        self.connection()?;
        FileHandle::open(self, path, mode, options)
    }

    /// Open `path`, run `f` on the handle, and close it on every exit path
    ///
    /// An error from `f` takes precedence over an error from closing.
    pub fn with_file<T, E, F>(
        &self,
        path: &str,
        mode: OpenMode,
        options: OpenOptions,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut FileHandle<'_, C>) -> std::result::Result<T, E>,
        E: From<HdfsError>,
    {
        let mut file = self.open(path, mode, options)?;
        let result = f(&mut file);
        let closed = file.close();

        match result {
            Ok(value) => {
                closed?;
                Ok(value)
            }
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!("Closing {} after failure also failed: {}", path, close_err);
                }
                Err(e)
            }
        }
    }

    /// Physical locations of the blocks covering `[start, start + length)`
    ///
    /// When `length` is `None` the file's current size is used.
    pub fn get_block_locations(
        &self,
        path: &str,
        start: u64,
        length: Option<u64>,
    ) -> Result<Vec<BlockLocation>> {
        let fs = self.connection()?;

        let length = match length {
            Some(length) => length,
            None => self.info(path)?.size,
        };
        if length == 0 {
            return Ok(Vec::new());
        }

        let start_native = to_offset("start", start)?;
        let length_native = to_offset("length", length)?;
        start_native.checked_add(length_native).ok_or_else(|| {
            HdfsError::InvalidArgument(format!("range {}+{} overflows", start, length))
        })?;

        debug!(
            "Fetching block locations for {} (start={}, length={})",
            path, start, length
        );

        self.client
            .get_file_block_locations(fs, path, start_native, length_native)
            .ok_or_else(|| self.path_error("get_block_locations", path))
    }

    /// Metadata for a single path
    pub fn info(&self, path: &str) -> Result<FileInfo> {
        let fs = self.connection()?;
        self.client
            .get_path_info(fs, path)
            .ok_or_else(|| self.path_error("info", path))
    }

    /// Metadata for every entry directly under `path`
    pub fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let fs = self.connection()?;
        self.client
            .list_directory(fs, path)
            .ok_or_else(|| self.path_error("list", path))
    }

    /// Create a directory, including missing parents
    pub fn mkdir(&self, path: &str) -> Result<bool> {
        let fs = self.connection()?;
        Ok(self.status("mkdir", path, self.client.create_directory(fs, path)))
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<bool> {
        let fs = self.connection()?;
        Ok(self.status("rename", from, self.client.rename(fs, from, to)))
    }

    /// Delete `path`; `recursive` is required for non-empty directories
    pub fn remove(&self, path: &str, recursive: bool) -> Result<bool> {
        let fs = self.connection()?;
        Ok(self.status("remove", path, self.client.delete(fs, path, recursive)))
    }

    /// Whether `path` exists
    ///
    /// The native call returns 0 when the path exists, unlike the mutators
    /// where 0 merely means success.
    pub fn exists(&self, path: &str) -> Result<bool> {
        let fs = self.connection()?;
        Ok(self.client.exists(fs, path) == 0)
    }

    /// Shrink a file to `new_length` bytes
    pub fn truncate(&self, path: &str, new_length: u64) -> Result<bool> {
        let fs = self.connection()?;
        let new_length = to_offset("new_length", new_length)?;
        Ok(self.status(
            "truncate",
            path,
            self.client.truncate(fs, path, new_length),
        ))
    }

    pub fn set_replication(&self, path: &str, replication: u16) -> Result<bool> {
        let fs = self.connection()?;
        let replication = to_replication(replication)?;
        Ok(self.status(
            "set_replication",
            path,
            self.client.set_replication(fs, path, replication),
        ))
    }

    /// Change permission bits; `mode` is given in octal, e.g. `0o755`
    pub fn chmod(&self, path: &str, mode: u16) -> Result<bool> {
        let fs = self.connection()?;
        if mode > 0o7777 {
            return Err(HdfsError::InvalidArgument(format!(
                "mode {:o} exceeds 7777",
                mode
            )));
        }
        Ok(self.status("chmod", path, self.client.chmod(fs, path, mode as i16)))
    }

    /// Change owner and/or group; `None` leaves that attribute untouched
    pub fn chown(&self, path: &str, owner: Option<&str>, group: Option<&str>) -> Result<bool> {
        let fs = self.connection()?;
        if owner.is_none() && group.is_none() {
            return Err(HdfsError::InvalidArgument(
                "chown needs an owner or a group".to_string(),
            ));
        }
        Ok(self.status(
            "chown",
            path,
            self.client.chown(fs, path, owner, group),
        ))
    }

    fn status(&self, op: &str, path: &str, code: i32) -> bool {
        if code == 0 {
            debug!("{} {} succeeded", op, path);
            true
        } else {
            debug!(
                "{} {} failed with code {}",
                op,
                path,
                self.client.last_error()
            );
            false
        }
    }

    fn path_error(&self, op: &'static str, path: &str) -> HdfsError {
        match self.client.last_error() {
            errno::ENOENT => HdfsError::NotFound(path.to_string()),
            code => HdfsError::Io { op, code },
        }
    }
}

impl<C: NativeClient> fmt::Display for FilesystemSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_connected() {
            "Connected"
        } else {
            "Disconnected"
        };
        write!(f, "hdfs://{}:{}, {}", self.config.host, self.config.port, state)
    }
}

impl<C: NativeClient> fmt::Debug for FilesystemSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemSession")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl<C: NativeClient> Drop for FilesystemSession<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            debug!(
                "Session for {} dropped while connected, disconnecting",
                self.config.endpoint()
            );
            self.disconnect();
        }
    }
}

/// Convert a byte offset or length to the native signed representation
pub(crate) fn to_offset(what: &str, value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| HdfsError::InvalidArgument(format!("{} {} out of range", what, value)))
}

pub(crate) fn to_replication(replication: u16) -> Result<i16> {
    match i16::try_from(replication) {
        Ok(r) if r > 0 => Ok(r),
        _ => Err(HdfsError::InvalidArgument(format!(
            "replication {} out of range",
            replication
        ))),
    }
}
