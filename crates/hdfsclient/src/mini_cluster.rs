//! In-memory HDFS cluster
//!
//! [`MiniCluster`] implements [`NativeClient`] against a namespace held in
//! process memory. It follows the native conventions closely (status codes,
//! `last_error`, buffered writes that become visible on flush, short reads)
//! so that sessions and file handles behave against it as they would against
//! a real namenode. Clones share the same cluster.
//!
//! Every native call is counted per operation name, see [`MiniCluster::calls`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::native::{errno, NativeClient};
use crate::types::{BlockLocation, FileInfo, FileKind, OpenFlags};

const DEFAULT_BLOCK_SIZE: u64 = 128 * 1024 * 1024;
const DEFAULT_PACKET_SIZE: usize = 64 * 1024;
const DEFAULT_REPLICATION: u16 = 3;
const DEFAULT_USER: &str = "hdfs";
const SUPERGROUP: &str = "supergroup";

/// Layout of a [`MiniCluster`]
#[derive(Debug, Clone)]
pub struct MiniClusterConfig {
    /// Host the namenode answers on
    pub host: String,
    /// Port the namenode answers on
    pub port: u16,
    /// Datanode names blocks are placed on, round-robin
    pub datanodes: Vec<String>,
    /// Block size for files opened without one
    pub block_size: u64,
    /// Largest number of bytes a single read returns
    pub packet_size: usize,
    /// Key prefixes `builder_conf_set_str` accepts
    pub accepted_prefixes: Vec<String>,
}

impl MiniClusterConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            datanodes: vec!["dn1".into(), "dn2".into(), "dn3".into()],
            block_size: DEFAULT_BLOCK_SIZE,
            packet_size: DEFAULT_PACKET_SIZE,
            accepted_prefixes: ["dfs.", "hadoop.", "fs.", "ipc."]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    pub fn with_datanodes<I, S>(mut self, datanodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datanodes = datanodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }
}

/// Connection builder for [`MiniCluster`]
#[derive(Debug, Default)]
pub struct MiniBuilder {
    host: Option<String>,
    port: u16,
    user: Option<String>,
    params: BTreeMap<String, String>,
}

/// A live connection to a [`MiniCluster`]
#[derive(Debug)]
pub struct MiniFs {
    id: u64,
    user: String,
}

/// An open file on a [`MiniCluster`]
#[derive(Debug)]
pub struct MiniFile {
    id: u64,
    path: String,
    writable: bool,
    /// Read position, or bytes already flushed for writers
    pos: u64,
    /// Written but not yet flushed
    pending: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Node {
    kind: FileKind,
    data: Vec<u8>,
    replication: u16,
    block_size: u64,
    owner: String,
    group: String,
    permissions: u16,
    modified: i64,
    accessed: i64,
}

impl Node {
    fn directory(owner: &str, permissions: u16) -> Self {
        let now = now();
        Self {
            kind: FileKind::Directory,
            data: Vec::new(),
            replication: 0,
            block_size: 0,
            owner: owner.to_string(),
            group: SUPERGROUP.to_string(),
            permissions,
            modified: now,
            accessed: now,
        }
    }

    fn file(owner: &str, replication: u16, block_size: u64) -> Self {
        let now = now();
        Self {
            kind: FileKind::File,
            data: Vec::new(),
            replication,
            block_size,
            owner: owner.to_string(),
            group: SUPERGROUP.to_string(),
            permissions: 0o644,
            modified: now,
            accessed: now,
        }
    }

    fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

#[derive(Debug)]
struct ClusterState {
    config: MiniClusterConfig,
    /// Absolute normalised path -> node
    nodes: BTreeMap<String, Node>,
    connections: HashSet<u64>,
    open_files: HashSet<u64>,
    next_id: u64,
    calls: HashMap<&'static str, u64>,
    last_error: i32,
    /// One-shot failures armed with `MiniCluster::fail_next`
    faults: HashMap<&'static str, i32>,
    short_write: Option<usize>,
}

/// Outcome of a namespace operation: `Err` carries the errno to record
type NsResult<T> = std::result::Result<T, i32>;

impl ClusterState {
    fn new(config: MiniClusterConfig) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::directory(DEFAULT_USER, 0o755));
        nodes.insert("/tmp".to_string(), Node::directory(DEFAULT_USER, 0o1777));
        Self {
            config,
            nodes,
            connections: HashSet::new(),
            open_files: HashSet::new(),
            next_id: 1,
            calls: HashMap::new(),
            last_error: 0,
            faults: HashMap::new(),
            short_write: None,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn uri(&self, path: &str) -> String {
        format!("hdfs://{}:{}{}", self.config.host, self.config.port, path)
    }

    fn info(&self, path: &str, node: &Node) -> FileInfo {
        FileInfo {
            kind: node.kind,
            name: self.uri(path),
            last_modified: node.modified,
            size: node.data.len() as u64,
            replication: node.replication,
            block_size: node.block_size,
            owner: node.owner.clone(),
            group: node.group.clone(),
            permissions: node.permissions,
            last_access: node.accessed,
        }
    }

    fn node(&self, path: &str) -> NsResult<&Node> {
        self.nodes.get(path).ok_or(errno::ENOENT)
    }

    fn file_mut(&mut self, path: &str) -> NsResult<&mut Node> {
        let node = self.nodes.get_mut(path).ok_or(errno::ENOENT)?;
        if node.is_dir() {
            return Err(errno::EISDIR);
        }
        Ok(node)
    }

    /// Create `path` and any missing ancestors as directories
    fn mkdirs(&mut self, path: &str, owner: &str) -> NsResult<()> {
        let mut current = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current.push('/');
            current.push_str(component);
            match self.nodes.get(&current) {
                Some(node) if node.is_dir() => {}
                Some(_) if current == path => return Err(errno::EEXIST),
                Some(_) => return Err(errno::ENOTDIR),
                None => {
                    self.nodes
                        .insert(current.clone(), Node::directory(owner, 0o755));
                }
            }
        }
        Ok(())
    }

    fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .filter(move |(k, _)| {
                let rest = &k[if dir == "/" { 1 } else { dir.len() + 1 }..];
                !rest.is_empty() && !rest.contains('/')
            })
    }

    fn subtree_keys(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path);
        self.nodes
            .keys()
            .filter(|k| k.as_str() == path || k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn open(
        &mut self,
        fs: &MiniFs,
        path: &str,
        flags: OpenFlags,
        replication: i16,
        block_size: i64,
    ) -> NsResult<MiniFile> {
        if flags.contains(OpenFlags::RDWR) {
            return Err(errno::ENOTSUP);
        }

        let writable = flags.contains(OpenFlags::WRONLY);
        let pos = if !writable {
            let node = self.node(path)?;
            if node.is_dir() {
                return Err(errno::EISDIR);
            }
            0
        } else if flags.contains(OpenFlags::APPEND) {
            self.file_mut(path)?.data.len() as u64
        } else {
            if let Some(existing) = self.nodes.get(path) {
                if existing.is_dir() {
                    return Err(errno::EISDIR);
                }
            }
            let parent = parent_of(path);
            self.mkdirs(parent, &fs.user)?;
            let replication = if replication > 0 {
                replication as u16
            } else {
                DEFAULT_REPLICATION
            };
            let block_size = if block_size > 0 {
                block_size as u64
            } else {
                self.config.block_size
            };
            self.nodes.insert(
                path.to_string(),
                Node::file(&fs.user, replication, block_size),
            );
            0
        };

        let id = self.next_id();
        self.open_files.insert(id);
        Ok(MiniFile {
            id,
            path: path.to_string(),
            writable,
            pos,
            pending: Vec::new(),
        })
    }

    fn check_open(&self, file: &MiniFile) -> NsResult<()> {
        if self.open_files.contains(&file.id) {
            Ok(())
        } else {
            Err(errno::EBADF)
        }
    }

    fn read(&mut self, file: &mut MiniFile, buf: &mut [u8]) -> NsResult<usize> {
        self.check_open(file)?;
        if file.writable {
            return Err(errno::EBADF);
        }
        let packet_size = self.config.packet_size;
        let node = self.nodes.get_mut(&file.path).ok_or(errno::EIO)?;
        let start = (file.pos as usize).min(node.data.len());
        let n = buf.len().min(packet_size).min(node.data.len() - start);
        buf[..n].copy_from_slice(&node.data[start..start + n]);
        node.accessed = now();
        file.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self, file: &mut MiniFile) -> NsResult<()> {
        self.check_open(file)?;
        if !file.writable || file.pending.is_empty() {
            return Ok(());
        }
        let node = self.nodes.get_mut(&file.path).ok_or(errno::EIO)?;
        node.data.extend_from_slice(&file.pending);
        node.modified = now();
        file.pos += file.pending.len() as u64;
        file.pending.clear();
        Ok(())
    }

    fn seek(&self, file: &mut MiniFile, pos: i64) -> NsResult<()> {
        self.check_open(file)?;
        let pos = u64::try_from(pos).map_err(|_| errno::EINVAL)?;
        if file.writable {
            // Writers are append-only streams
            if pos == file.pos + file.pending.len() as u64 {
                return Ok(());
            }
            return Err(errno::ENOTSUP);
        }
        let size = self.node(&file.path).map_err(|_| errno::EIO)?.data.len() as u64;
        if pos > size {
            return Err(errno::EINVAL);
        }
        file.pos = pos;
        Ok(())
    }

    fn block_locations(&self, path: &str, start: u64, length: u64) -> NsResult<Vec<BlockLocation>> {
        let node = self.node(path)?;
        if node.is_dir() {
            return Err(errno::EISDIR);
        }

        let size = node.data.len() as u64;
        let block_size = node.block_size.max(1);
        let end = start.saturating_add(length).min(size);
        if start >= end {
            return Ok(Vec::new());
        }

        let datanodes = &self.config.datanodes;
        let replicas = (node.replication as usize).min(datanodes.len());
        let first = start / block_size;
        let last = (end - 1) / block_size;

        Ok((first..=last)
            .map(|index| {
                let offset = index * block_size;
                BlockLocation {
                    hosts: (0..replicas)
                        .map(|r| datanodes[(index as usize + r) % datanodes.len()].clone())
                        .collect(),
                    offset,
                    length: block_size.min(size - offset),
                }
            })
            .collect())
    }

    fn delete(&mut self, path: &str, recursive: bool) -> NsResult<()> {
        if path == "/" {
            return Err(errno::EINVAL);
        }
        let node = self.node(path)?;
        if node.is_dir() && !recursive && self.children(path).next().is_some() {
            return Err(errno::ENOTEMPTY);
        }
        for key in self.subtree_keys(path) {
            self.nodes.remove(&key);
        }
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> NsResult<()> {
        if from == "/" || to == "/" || to.starts_with(&format!("{}/", from)) {
            return Err(errno::EINVAL);
        }
        self.node(from)?;
        if self.nodes.contains_key(to) {
            return Err(errno::EEXIST);
        }
        match self.nodes.get(parent_of(to)) {
            Some(parent) if parent.is_dir() => {}
            Some(_) => return Err(errno::ENOTDIR),
            None => return Err(errno::ENOENT),
        }

        for key in self.subtree_keys(from) {
            if let Some(node) = self.nodes.remove(&key) {
                let moved = format!("{}{}", to, &key[from.len()..]);
                self.nodes.insert(moved, node);
            }
        }
        Ok(())
    }

    fn truncate(&mut self, path: &str, new_length: i64) -> NsResult<()> {
        let new_length = usize::try_from(new_length).map_err(|_| errno::EINVAL)?;
        let node = self.file_mut(path)?;
        if new_length > node.data.len() {
            return Err(errno::EINVAL);
        }
        node.data.truncate(new_length);
        node.modified = now();
        Ok(())
    }
}

/// Resolve `path` against the connection's home directory and normalise it
fn resolve(path: &str, user: &str) -> String {
    let path = match path.find("://") {
        Some(i) => {
            let rest = &path[i + 3..];
            rest.find('/').map(|j| &rest[j..]).unwrap_or("/")
        }
        None => path,
    };

    let mut components: Vec<&str> = Vec::new();
    if !path.starts_with('/') {
        components.push("user");
        components.push(user);
    }
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            c => components.push(c),
        }
    }
    format!("/{}", components.join("/"))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// An in-memory HDFS cluster
#[derive(Debug, Clone)]
pub struct MiniCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MiniCluster {
    pub fn new(config: MiniClusterConfig) -> Self {
        debug!(
            "Starting mini cluster at {}:{} with {} datanodes",
            config.host,
            config.port,
            config.datanodes.len()
        );
        Self {
            state: Arc::new(Mutex::new(ClusterState::new(config))),
        }
    }

    /// Number of native calls made so far for `op` (e.g. `"read"`)
    pub fn calls(&self, op: &str) -> u64 {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Connections not yet released with `disconnect`
    pub fn open_connections(&self) -> usize {
        self.lock().connections.len()
    }

    /// Files not yet released with `close_file`
    pub fn open_files(&self) -> usize {
        self.lock().open_files.len()
    }

    /// Make the next `op` call (`"read"`, `"write"`, `"seek"`, `"tell"` or
    /// `"flush"`) fail with errno `code`
    pub fn fail_next(&self, op: &'static str, code: i32) {
        self.lock().faults.insert(op, code);
    }

    /// Make the next `write` accept at most `len` bytes
    pub fn short_write_next(&self, len: usize) {
        self.lock().short_write = Some(len);
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the cluster and count one call of `op`
    fn enter(&self, op: &'static str) -> MutexGuard<'_, ClusterState> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        trace!("mini cluster call {}", op);
        state
    }

    /// Consume an armed fault for `op`, recording its errno
    fn injected(state: &mut ClusterState, op: &'static str) -> bool {
        match state.faults.remove(op) {
            Some(code) => {
                debug!("mini cluster injecting errno {} into {}", code, op);
                state.last_error = code;
                true
            }
            None => false,
        }
    }

    /// Map a namespace result onto the native status convention
    fn status(state: &mut ClusterState, result: NsResult<()>) -> i32 {
        match result {
            Ok(()) => 0,
            Err(code) => {
                state.last_error = code;
                -1
            }
        }
    }

    fn option<T>(state: &mut ClusterState, result: NsResult<T>) -> Option<T> {
        result.map_err(|code| state.last_error = code).ok()
    }
}

impl NativeClient for MiniCluster {
    type Builder = MiniBuilder;
    type Fs = MiniFs;
    type File = MiniFile;

    fn new_builder(&self) -> MiniBuilder {
        self.enter("new_builder");
        MiniBuilder::default()
    }

    fn builder_set_namenode(&self, builder: &mut MiniBuilder, host: &str) {
        builder.host = Some(host.to_string());
    }

    fn builder_set_namenode_port(&self, builder: &mut MiniBuilder, port: u16) {
        builder.port = port;
    }

    fn builder_set_user_name(&self, builder: &mut MiniBuilder, user: &str) {
        builder.user = Some(user.to_string());
    }

    fn builder_set_kerb_ticket_cache_path(&self, builder: &mut MiniBuilder, path: &str) {
        builder
            .params
            .insert("hadoop.security.kerberos.ticket.cache.path".into(), path.into());
    }

    fn builder_set_token(&self, builder: &mut MiniBuilder, token: &str) {
        builder
            .params
            .insert("hadoop.security.token".into(), token.into());
    }

    fn builder_conf_set_str(&self, builder: &mut MiniBuilder, key: &str, value: &str) -> i32 {
        let mut state = self.enter("builder_conf_set_str");
        if state
            .config
            .accepted_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
        {
            builder.params.insert(key.to_string(), value.to_string());
            0
        } else {
            state.last_error = errno::EINVAL;
            -1
        }
    }

    fn builder_connect(&self, builder: MiniBuilder) -> Option<MiniFs> {
        let mut state = self.enter("builder_connect");
        let Some(host) = builder.host else {
            state.last_error = errno::EINVAL;
            return None;
        };
        if host != state.config.host || builder.port != state.config.port {
            debug!("mini cluster refused connection to {}:{}", host, builder.port);
            state.last_error = errno::ECONNREFUSED;
            return None;
        }

        let id = state.next_id();
        state.connections.insert(id);
        debug!(
            "mini cluster accepted connection {} with {} parameters",
            id,
            builder.params.len()
        );
        Some(MiniFs {
            id,
            user: builder.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
        })
    }

    fn disconnect(&self, fs: MiniFs) -> i32 {
        let mut state = self.enter("disconnect");
        if state.connections.remove(&fs.id) {
            0
        } else {
            state.last_error = errno::EBADF;
            -1
        }
    }

    fn open_file(
        &self,
        fs: &MiniFs,
        path: &str,
        flags: OpenFlags,
        _buffer_size: i32,
        replication: i16,
        block_size: i64,
    ) -> Option<MiniFile> {
        let mut state = self.enter("open_file");
        let path = resolve(path, &fs.user);
        let result = state.open(fs, &path, flags, replication, block_size);
        Self::option(&mut state, result)
    }

    fn close_file(&self, _fs: &MiniFs, mut file: MiniFile) -> i32 {
        let mut state = self.enter("close_file");
        let result = state.flush(&mut file);
        state.open_files.remove(&file.id);
        Self::status(&mut state, result)
    }

    fn read(&self, _fs: &MiniFs, file: &mut MiniFile, buf: &mut [u8]) -> i32 {
        let mut state = self.enter("read");
        if Self::injected(&mut state, "read") {
            return -1;
        }
        match state.read(file, buf) {
            Ok(n) => n as i32,
            Err(code) => {
                state.last_error = code;
                -1
            }
        }
    }

    fn write(&self, _fs: &MiniFs, file: &mut MiniFile, data: &[u8]) -> i32 {
        let mut state = self.enter("write");
        if Self::injected(&mut state, "write") {
            return -1;
        }
        if let Err(code) = state.check_open(file) {
            state.last_error = code;
            return -1;
        }
        if !file.writable {
            state.last_error = errno::EBADF;
            return -1;
        }
        let accepted = match state.short_write.take() {
            Some(limit) => &data[..limit.min(data.len())],
            None => data,
        };
        file.pending.extend_from_slice(accepted);
        accepted.len() as i32
    }

    fn seek(&self, _fs: &MiniFs, file: &mut MiniFile, pos: i64) -> i32 {
        let mut state = self.enter("seek");
        if Self::injected(&mut state, "seek") {
            return -1;
        }
        let result = state.seek(file, pos);
        Self::status(&mut state, result)
    }

    fn tell(&self, _fs: &MiniFs, file: &MiniFile) -> i64 {
        let mut state = self.enter("tell");
        if Self::injected(&mut state, "tell") {
            return -1;
        }
        match state.check_open(file) {
            Ok(()) => (file.pos + file.pending.len() as u64) as i64,
            Err(code) => {
                state.last_error = code;
                -1
            }
        }
    }

    fn flush(&self, _fs: &MiniFs, file: &mut MiniFile) -> i32 {
        let mut state = self.enter("flush");
        if Self::injected(&mut state, "flush") {
            return -1;
        }
        let result = state.flush(file);
        Self::status(&mut state, result)
    }

    fn get_path_info(&self, fs: &MiniFs, path: &str) -> Option<FileInfo> {
        let mut state = self.enter("get_path_info");
        let path = resolve(path, &fs.user);
        let result = state.node(&path).map(|node| state.info(&path, node));
        Self::option(&mut state, result)
    }

    fn list_directory(&self, fs: &MiniFs, path: &str) -> Option<Vec<FileInfo>> {
        let mut state = self.enter("list_directory");
        let path = resolve(path, &fs.user);
        let result = state.node(&path).map(|node| {
            if node.is_dir() {
                state
                    .children(&path)
                    .map(|(child, node)| state.info(child, node))
                    .collect()
            } else {
                vec![state.info(&path, node)]
            }
        });
        Self::option(&mut state, result)
    }

    fn get_file_block_locations(
        &self,
        fs: &MiniFs,
        path: &str,
        start: i64,
        length: i64,
    ) -> Option<Vec<BlockLocation>> {
        let mut state = self.enter("get_file_block_locations");
        let path = resolve(path, &fs.user);
        let result = match (u64::try_from(start), u64::try_from(length)) {
            (Ok(start), Ok(length)) => state.block_locations(&path, start, length),
            _ => Err(errno::EINVAL),
        };
        Self::option(&mut state, result)
    }

    fn create_directory(&self, fs: &MiniFs, path: &str) -> i32 {
        let mut state = self.enter("create_directory");
        let path = resolve(path, &fs.user);
        let result = state.mkdirs(&path, &fs.user);
        Self::status(&mut state, result)
    }

    fn rename(&self, fs: &MiniFs, from: &str, to: &str) -> i32 {
        let mut state = self.enter("rename");
        let from = resolve(from, &fs.user);
        let to = resolve(to, &fs.user);
        let result = state.rename(&from, &to);
        Self::status(&mut state, result)
    }

    fn delete(&self, fs: &MiniFs, path: &str, recursive: bool) -> i32 {
        let mut state = self.enter("delete");
        let path = resolve(path, &fs.user);
        let result = state.delete(&path, recursive);
        Self::status(&mut state, result)
    }

    fn exists(&self, fs: &MiniFs, path: &str) -> i32 {
        let mut state = self.enter("exists");
        let path = resolve(path, &fs.user);
        let result = state.node(&path).map(|_| ());
        Self::status(&mut state, result)
    }

    fn truncate(&self, fs: &MiniFs, path: &str, new_length: i64) -> i32 {
        let mut state = self.enter("truncate");
        let path = resolve(path, &fs.user);
        let result = state.truncate(&path, new_length);
        Self::status(&mut state, result)
    }

    fn set_replication(&self, fs: &MiniFs, path: &str, replication: i16) -> i32 {
        let mut state = self.enter("set_replication");
        let path = resolve(path, &fs.user);
        let result = if replication <= 0 {
            Err(errno::EINVAL)
        } else {
            state
                .file_mut(&path)
                .map(|node| node.replication = replication as u16)
        };
        Self::status(&mut state, result)
    }

    fn chmod(&self, fs: &MiniFs, path: &str, mode: i16) -> i32 {
        let mut state = self.enter("chmod");
        let path = resolve(path, &fs.user);
        let result = state
            .nodes
            .get_mut(&path)
            .map(|node| node.permissions = (mode as u16) & 0o7777)
            .ok_or(errno::ENOENT);
        Self::status(&mut state, result)
    }

    fn chown(&self, fs: &MiniFs, path: &str, owner: Option<&str>, group: Option<&str>) -> i32 {
        let mut state = self.enter("chown");
        let path = resolve(path, &fs.user);
        let result = state
            .nodes
            .get_mut(&path)
            .map(|node| {
                if let Some(owner) = owner {
                    node.owner = owner.to_string();
                }
                if let Some(group) = group {
                    node.group = group.to_string();
                }
            })
            .ok_or(errno::ENOENT);
        Self::status(&mut state, result)
    }

    fn last_error(&self) -> i32 {
        self.lock().last_error
    }
}
