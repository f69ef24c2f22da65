//! Session and open-option configuration
//!
//! Every recognised option is a named field. When loading from a client
//! configuration file, keys outside this set are rejected rather than
//! silently ignored.

use std::collections::BTreeMap;
use std::path::Path;

use hdfsconfig::{
    ConfigOption, Count, HdfsConfig, Size, CLIENT_SECTION, DEFAULT_NAMENODE_PORT, GLOBAL_SECTION,
};
use tracing::debug;

use crate::error::{HdfsError, Result};
use crate::types::OpenOptions;

/// Sections searched for client options, most specific first
const SECTIONS: &[&str] = &[CLIENT_SECTION, GLOBAL_SECTION];

/// Options accepted in the `[client]` and `[global]` sections
pub const KNOWN_OPTIONS: &[&str] = &[
    "namenode host",
    "namenode port",
    "user",
    "kerberos ticket cache",
    "token",
    "autoconnect",
    "replication",
    "buffer size",
    "block size",
];

/// Connection parameters for one [`FilesystemSession`](crate::FilesystemSession)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Namenode host name or address
    pub host: String,
    /// Namenode RPC port
    pub port: u16,
    /// User to connect as
    pub user: Option<String>,
    /// Path of the Kerberos ticket cache
    pub ticket_cache: Option<String>,
    /// Delegation token
    pub token: Option<String>,
    /// Extra parameters passed verbatim to the native builder
    pub extra_params: BTreeMap<String, String>,
    /// Connect as soon as the session is constructed
    pub autoconnect: bool,
}

impl SessionConfig {
    /// Configuration for `host` on the default port, connecting on construction
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_NAMENODE_PORT,
            user: None,
            ticket_cache: None,
            token: None,
            extra_params: BTreeMap::new(),
            autoconnect: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_ticket_cache(mut self, path: impl Into<String>) -> Self {
        self.ticket_cache = Some(path.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    pub fn with_autoconnect(mut self, autoconnect: bool) -> Self {
        self.autoconnect = autoconnect;
        self
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load from a client configuration file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hdfsclient::SessionConfig;
    ///
    /// let config = SessionConfig::from_conf_file("/etc/hadoop/conf/hdfs-client.conf")
    ///     .expect("Failed to read client config");
    /// ```
    pub fn from_conf_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = HdfsConfig::from_file(path)?;
        Self::from_hdfs_config(&config)
    }

    /// Build from an already parsed client configuration
    pub fn from_hdfs_config(config: &HdfsConfig) -> Result<Self> {
        config.check_known(SECTIONS, KNOWN_OPTIONS)?;

        let string_opt = |name: &'static str| {
            ConfigOption::new(name, String::new()).get_opt(config, SECTIONS)
        };

        let session = Self {
            host: config.namenode_host()?,
            port: config.namenode_port()?,
            user: string_opt("user")?,
            ticket_cache: string_opt("kerberos ticket cache")?,
            token: string_opt("token")?,
            extra_params: config.hadoop_params(),
            autoconnect: ConfigOption::new("autoconnect", true).get(config, SECTIONS)?,
        };

        debug!(
            "Loaded session config for {} ({} extra parameters)",
            session.endpoint(),
            session.extra_params.len()
        );

        Ok(session)
    }
}

impl OpenOptions {
    /// Read open defaults (`replication`, `buffer size`, `block size`) from a
    /// client configuration
    pub fn from_hdfs_config(config: &HdfsConfig) -> Result<Self> {
        let defaults = OpenOptions::default();

        let replication = ConfigOption::new("replication", Count(defaults.replication as u64))
            .get(config, SECTIONS)?;
        let buffer_size = ConfigOption::new("buffer size", Size(defaults.buffer_size as u64))
            .get(config, SECTIONS)?;
        let block_size =
            ConfigOption::new("block size", Size(defaults.block_size)).get(config, SECTIONS)?;

        let replication = u16::try_from(replication.0)
            .ok()
            .filter(|r| *r > 0)
            .ok_or_else(|| {
                HdfsError::InvalidArgument(format!("replication {} out of range", replication.0))
            })?;
        let buffer_size = u32::try_from(buffer_size.0).map_err(|_| {
            HdfsError::InvalidArgument(format!("buffer size {} out of range", buffer_size.0))
        })?;

        Ok(Self {
            replication,
            buffer_size,
            block_size: block_size.0,
            start_offset: 0,
        })
    }
}
