//! File handles
//!
//! A [`FileHandle`] is created by [`FilesystemSession::open`] and owns one
//! native open file. Its mode is fixed at open time; the only state change is
//! to closed, which is terminal.
//!
//! Mode checks happen here, before any native call, so a read on a write
//! handle (or the reverse) never reaches the native layer.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io::{self, SeekFrom};

use tracing::{debug, info, warn};

use crate::error::{HdfsError, Result};
use crate::native::NativeClient;
use crate::session::{to_offset, to_replication, FilesystemSession};
use crate::types::{BlockLocation, FileInfo, FileState, OpenMode, OpenOptions};

/// Largest buffer [`FileHandle::read`] hands to one native call
pub const MAX_READ_LEN: usize = 1 << 20;

/// An open file on an HDFS cluster
///
/// Dropping an open handle closes it, but that is only a safety net: call
/// [`FileHandle::close`] (or use [`FilesystemSession::with_file`]) to observe
/// close failures.
pub struct FileHandle<'s, C: NativeClient> {
    session: &'s FilesystemSession<C>,
    path: String,
    mode: OpenMode,
    replication: u16,
    file: Option<C::File>,
}

impl<'s, C: NativeClient> FileHandle<'s, C> {
    pub(crate) fn open(
        session: &'s FilesystemSession<C>,
        path: &str,
        mode: OpenMode,
        options: OpenOptions,
    ) -> Result<Self> {
        let fs = session.connection()?;

        let replication = to_replication(options.replication)?;
        let block_size = to_offset("block_size", options.block_size)?;
        let buffer_size = i32::try_from(options.buffer_size).map_err(|_| {
            HdfsError::InvalidArgument(format!("buffer size {} out of range", options.buffer_size))
        })?;
        if mode == OpenMode::Write && options.start_offset != 0 {
            return Err(HdfsError::InvalidArgument(format!(
                "start offset {} given for a truncating write of {}",
                options.start_offset, path
            )));
        }

        info!("Opening {} for {}", path, mode);

        let client = session.client();
        let file = client
            .open_file(fs, path, mode.flags(), buffer_size, replication, block_size)
            .ok_or_else(|| HdfsError::OpenFailed {
                path: path.to_string(),
                code: client.last_error(),
            })?;

        let mut handle = Self {
            session,
            path: path.to_string(),
            mode,
            replication: options.replication,
            file: Some(file),
        };

        if options.start_offset != 0 {
            if let Err(e) = handle.position_at(options.start_offset) {
                if let Err(close_err) = handle.close() {
                    debug!("Closing {} after failed positioning: {}", path, close_err);
                }
                return Err(e);
            }
        }

        Ok(handle)
    }

    /// Honour `start_offset`: seek for reads, verify the end of file for appends
    fn position_at(&mut self, offset: u64) -> Result<()> {
        match self.mode {
            OpenMode::Read => self.seek(offset),
            OpenMode::Append => {
                let end = self.tell()?;
                if end == offset {
                    Ok(())
                } else {
                    Err(HdfsError::InvalidArgument(format!(
                        "append to {} expected to start at {}, file ends at {}",
                        self.path, offset, end
                    )))
                }
            }
            OpenMode::Write => Ok(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn replication(&self) -> u16 {
        self.replication
    }

    pub fn state(&self) -> FileState {
        if self.file.is_some() {
            FileState::from(self.mode)
        } else {
            FileState::Closed
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// The session this handle was opened from
    pub fn session(&self) -> &'s FilesystemSession<C> {
        self.session
    }

    /// Native file and connection, after checking the handle is open and
    /// `op` is legal in this mode
    fn checked(&mut self, op: &'static str, writable: Option<bool>) -> Result<(&C::Fs, &mut C::File)> {
        let Some(file) = self.file.as_mut() else {
            return Err(HdfsError::Closed(self.path.clone()));
        };
        if let Some(writable) = writable {
            if self.mode.is_writable() != writable {
                return Err(HdfsError::WrongMode {
                    op,
                    path: self.path.clone(),
                    mode: self.mode,
                });
            }
        }
        let fs = self.session.connection()?;
        Ok((fs, file))
    }

    /// Read up to `max_len` bytes with a single native call
    ///
    /// Returns fewer bytes than requested when the native layer delivers
    /// fewer, and an empty buffer at end of file. A single call asks for at
    /// most [`MAX_READ_LEN`] bytes.
    pub fn read(&mut self, max_len: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(max_len.min(MAX_READ_LEN));
        let n = self.read_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf.freeze())
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let client = self.session.client();
        let (fs, file) = self.checked("read", Some(false))?;
        if buf.is_empty() {
            return Ok(0);
        }

        let len = buf.len().min(i32::MAX as usize);
        let ret = client.read(fs, file, &mut buf[..len]);
        if ret < 0 {
            return Err(HdfsError::Io {
                op: "read",
                code: client.last_error(),
            });
        }

        debug!("Read {} bytes from {}", ret, self.path);
        Ok(ret as usize)
    }

    /// Write all of `data` with a single native call
    ///
    /// A short write is an error; there is no retry loop.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let client = self.session.client();
        let (fs, file) = self.checked("write", Some(true))?;
        if data.is_empty() {
            return Ok(());
        }
        if data.len() > i32::MAX as usize {
            return Err(HdfsError::InvalidArgument(format!(
                "write of {} bytes exceeds a single native call",
                data.len()
            )));
        }

        let ret = client.write(fs, file, data);
        if ret < 0 {
            return Err(HdfsError::Io {
                op: "write",
                code: client.last_error(),
            });
        }
        if ret as usize != data.len() {
            return Err(HdfsError::ShortWrite {
                expected: data.len(),
                written: ret as usize,
            });
        }

        debug!("Wrote {} bytes to {}", data.len(), self.path);
        Ok(())
    }

    /// Move to absolute position `offset`
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        let client = self.session.client();
        let pos = to_offset("offset", offset)?;
        let (fs, file) = self.checked("seek", None)?;
        if client.seek(fs, file, pos) < 0 {
            return Err(HdfsError::Io {
                op: "seek",
                code: client.last_error(),
            });
        }
        Ok(())
    }

    /// Current position in the stream
    pub fn tell(&self) -> Result<u64> {
        let Some(file) = self.file.as_ref() else {
            return Err(HdfsError::Closed(self.path.clone()));
        };
        let client = self.session.client();
        let fs = self.session.connection()?;
        let pos = client.tell(fs, file);
        if pos < 0 {
            return Err(HdfsError::Io {
                op: "tell",
                code: client.last_error(),
            });
        }
        Ok(pos as u64)
    }

    /// Ask the native layer to make buffered writes visible to readers
    ///
    /// Native flush failures are logged, not returned. A no-op on read
    /// handles.
    pub fn flush(&mut self) -> Result<()> {
        let client = self.session.client();
        let writable = self.mode.is_writable();
        let (fs, file) = self.checked("flush", None)?;
        if writable && client.flush(fs, file) != 0 {
            warn!(
                "Flush of {} reported code {}",
                self.path,
                client.last_error()
            );
        }
        Ok(())
    }

    /// Flush pending writes and release the native file
    ///
    /// Closing an already closed handle is a no-op. The handle is closed
    /// afterwards even when the native close reports failure.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            debug!("{} already closed", self.path);
            return Ok(());
        };

        let client = self.session.client();
        let fs = self.session.connection()?;

        if self.mode.is_writable() && client.flush(fs, &mut file) != 0 {
            warn!(
                "Flush of {} before close reported code {}",
                self.path,
                client.last_error()
            );
        }

        info!("Closing {}", self.path);
        if client.close_file(fs, file) != 0 {
            return Err(HdfsError::Io {
                op: "close",
                code: client.last_error(),
            });
        }
        Ok(())
    }

    /// Block locations of the whole file; the stream position is untouched
    pub fn block_locations(&self) -> Result<Vec<BlockLocation>> {
        self.session.get_block_locations(&self.path, 0, None)
    }

    /// Metadata for this file's path
    pub fn info(&self) -> Result<FileInfo> {
        self.session.info(&self.path)
    }
}

impl<C: NativeClient> fmt::Display for FileHandle<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_closed() {
            "closed"
        } else {
            self.mode.as_str()
        };
        write!(
            f,
            "hdfs://{}:{}{}, {}",
            self.session.host(),
            self.session.port(),
            self.path,
            state
        )
    }
}

impl<C: NativeClient> fmt::Debug for FileHandle<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

impl<C: NativeClient> Drop for FileHandle<'_, C> {
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!("{} dropped while open, closing", self.path);
            if let Err(e) = self.close() {
                warn!("Closing {} on drop failed: {}", self.path, e);
            }
        }
    }
}

impl<C: NativeClient> io::Read for FileHandle<'_, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl<C: NativeClient> io::Write for FileHandle<'_, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FileHandle::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(FileHandle::flush(self)?)
    }
}

impl<C: NativeClient> io::Seek for FileHandle<'_, C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.tell()?.checked_add_signed(delta),
            SeekFrom::End(delta) => self.info()?.size.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        FileHandle::seek(self, target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::mini_cluster::{MiniCluster, MiniClusterConfig};
    use crate::native::errno;
    use std::io::{Read, Seek, Write};

    fn session(mini: &MiniCluster) -> FilesystemSession<MiniCluster> {
        FilesystemSession::new(mini.clone(), SessionConfig::new("nn1")).unwrap()
    }

    fn small_blocks() -> MiniCluster {
        MiniCluster::new(
            MiniClusterConfig::new("nn1", 9000)
                .with_block_size(1024)
                .with_packet_size(256),
        )
    }

    #[test]
    fn test_state_machine() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut f = fs
            .open("/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        assert_eq!(f.state(), FileState::OpenForWrite);
        f.close().unwrap();
        assert_eq!(f.state(), FileState::Closed);

        let f = fs
            .open("/f", OpenMode::Append, OpenOptions::default())
            .unwrap();
        assert_eq!(f.state(), FileState::OpenForAppend);
        drop(f);

        let f = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        assert_eq!(f.state(), FileState::OpenForRead);
    }

    #[test]
    fn test_wrong_mode_does_not_reach_native_layer() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut w = fs
            .open("/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        let err = w.read(10).unwrap_err();
        assert!(matches!(err, HdfsError::WrongMode { op: "read", .. }));
        assert!(err.is_precondition());
        assert_eq!(mini.calls("read"), 0);
        w.close().unwrap();

        let mut r = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        let err = r.write(b"x").unwrap_err();
        assert!(matches!(err, HdfsError::WrongMode { op: "write", .. }));
        assert_eq!(mini.calls("write"), 0);
    }

    #[test]
    fn test_closed_handle_rejects_io() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut f = fs
            .open("/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        f.close().unwrap();

        assert!(matches!(f.write(b"x"), Err(HdfsError::Closed(_))));
        assert!(matches!(f.read(1), Err(HdfsError::Closed(_))));
        assert!(matches!(f.seek(0), Err(HdfsError::Closed(_))));
        assert!(matches!(f.tell(), Err(HdfsError::Closed(_))));
        assert!(matches!(f.flush(), Err(HdfsError::Closed(_))));
    }

    #[test]
    fn test_double_close() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut f = fs
            .open("/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        f.write(b"data").unwrap();
        f.close().unwrap();
        f.close().unwrap();
        drop(f);

        assert_eq!(mini.calls("close_file"), 1);
        assert_eq!(mini.calls("flush"), 1);
    }

    #[test]
    fn test_read_is_single_call() {
        let mini = small_blocks();
        let fs = session(&mini);

        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(&[7u8; 1000])
        })
        .unwrap();

        let mut f = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        // Packet size caps each native read at 256 bytes
        let chunk = f.read(1000).unwrap();
        assert_eq!(chunk.len(), 256);
        assert_eq!(mini.calls("read"), 1);
        assert_eq!(f.tell().unwrap(), 256);
    }

    #[test]
    fn test_read_zero_bytes_skips_native_call() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"abc")
        })
        .unwrap();

        let mut f = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        assert!(f.read(0).unwrap().is_empty());
        assert_eq!(mini.calls("read"), 0);
    }

    #[test]
    fn test_seek_and_tell() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"0123456789")
        })
        .unwrap();

        let mut f = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        f.seek(4).unwrap();
        assert_eq!(f.tell().unwrap(), 4);
        assert_eq!(&f.read(3).unwrap()[..], b"456");
        assert_eq!(f.tell().unwrap(), 7);

        let err = f.seek(100).unwrap_err();
        assert!(matches!(err, HdfsError::Io { op: "seek", .. }));
    }

    #[test]
    fn test_start_offset_for_read() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"0123456789")
        })
        .unwrap();

        let mut f = fs
            .open(
                "/f",
                OpenMode::Read,
                OpenOptions::default().with_start_offset(8),
            )
            .unwrap();
        assert_eq!(&f.read(10).unwrap()[..], b"89");
    }

    #[test]
    fn test_start_offset_for_append() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"abc")
        })
        .unwrap();

        let mut f = fs
            .open(
                "/f",
                OpenMode::Append,
                OpenOptions::default().with_start_offset(3),
            )
            .unwrap();
        f.write(b"def").unwrap();
        f.close().unwrap();
        assert_eq!(fs.info("/f").unwrap().size, 6);

        let err = fs
            .open(
                "/f",
                OpenMode::Append,
                OpenOptions::default().with_start_offset(3),
            )
            .unwrap_err();
        assert!(err.is_precondition());
        // The handle opened to check the offset was released
        assert_eq!(mini.calls("open_file"), mini.calls("close_file"));
    }

    #[test]
    fn test_start_offset_for_write_rejected() {
        let mini = small_blocks();
        let fs = session(&mini);
        let err = fs
            .open(
                "/f",
                OpenMode::Write,
                OpenOptions::default().with_start_offset(1),
            )
            .unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(mini.calls("open_file"), 0);
    }

    #[test]
    fn test_zero_replication_rejected() {
        let mini = small_blocks();
        let fs = session(&mini);
        let err = fs
            .open("/f", OpenMode::Write, OpenOptions::default().with_replication(0))
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mini = small_blocks();
        let fs = session(&mini);
        match fs.open("/nope", OpenMode::Read, OpenOptions::default()) {
            Err(HdfsError::OpenFailed { path, code }) => {
                assert_eq!(path, "/nope");
                assert_eq!(code, crate::native::errno::ENOENT);
            }
            other => panic!("unexpected result: {other:?}"),
        };
    }

    #[test]
    fn test_display() {
        let mini = small_blocks();
        let fs = session(&mini);
        let mut f = fs
            .open("/t/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        assert_eq!(f.to_string(), "hdfs://nn1:9000/t/f, write");
        f.close().unwrap();
        assert_eq!(f.to_string(), "hdfs://nn1:9000/t/f, closed");
    }

    #[test]
    fn test_flush_makes_data_visible() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut w = fs
            .open("/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        w.write(b"hello").unwrap();
        assert_eq!(fs.info("/f").unwrap().size, 0);
        w.flush().unwrap();
        assert_eq!(fs.info("/f").unwrap().size, 5);
        w.close().unwrap();
    }

    #[test]
    fn test_block_locations_keep_position() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(&[1u8; 3000])
        })
        .unwrap();

        let mut f = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        f.read(100).unwrap();
        let blocks = f.block_locations().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(f.tell().unwrap(), 100);
        assert_eq!(f.info().unwrap().size, 3000);
    }

    #[test]
    fn test_drop_closes() {
        let mini = small_blocks();
        let fs = session(&mini);
        {
            let mut f = fs
                .open("/f", OpenMode::Write, OpenOptions::default())
                .unwrap();
            f.write(b"abc").unwrap();
        }
        assert_eq!(mini.calls("close_file"), 1);
        assert_eq!(fs.info("/f").unwrap().size, 3);
    }

    #[test]
    fn test_std_io_traits() {
        let mini = small_blocks();
        let fs = session(&mini);

        {
            let mut w = fs
                .open("/f", OpenMode::Write, OpenOptions::default())
                .unwrap();
            w.write_all(b"0123456789").unwrap();
            Write::flush(&mut w).unwrap();
            w.close().unwrap();
        }

        let mut r = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        assert_eq!(Seek::seek(&mut r, SeekFrom::End(-3)).unwrap(), 7);
        let mut tail = String::new();
        r.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "789");

        assert_eq!(Seek::seek(&mut r, SeekFrom::Start(2)).unwrap(), 2);
        assert_eq!(Seek::seek(&mut r, SeekFrom::Current(3)).unwrap(), 5);
        let err = Seek::seek(&mut r, SeekFrom::Current(-10)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let mut all = Vec::new();
        Seek::seek(&mut r, SeekFrom::Start(0)).unwrap();
        r.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"0123456789");
    }

    #[test]
    fn test_read_failure_carries_native_code() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/f", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"payload")
        })
        .unwrap();

        let mut f = fs.open("/f", OpenMode::Read, OpenOptions::default()).unwrap();
        mini.fail_next("read", errno::EIO);
        let err = f.read(16).unwrap_err();
        assert!(matches!(
            err,
            HdfsError::Io {
                op: "read",
                code: errno::EIO
            }
        ));
        assert!(!err.is_precondition());
        assert_eq!(mini.calls("read"), 1);

        // The handle stays open and the next read succeeds
        assert_eq!(&f.read(16).unwrap()[..], b"payload");
    }

    #[test]
    fn test_read_after_remove_is_io_error() {
        let mini = small_blocks();
        let fs = session(&mini);
        fs.with_file("/gone", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(b"abc")
        })
        .unwrap();

        let mut f = fs
            .open("/gone", OpenMode::Read, OpenOptions::default())
            .unwrap();
        assert!(fs.remove("/gone", false).unwrap());
        assert!(matches!(
            f.read(3),
            Err(HdfsError::Io {
                op: "read",
                code: errno::EIO
            })
        ));
    }

    #[test]
    fn test_short_write_is_fatal() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut f = fs
            .open("/short", OpenMode::Write, OpenOptions::default())
            .unwrap();
        mini.short_write_next(4);
        match f.write(b"0123456789") {
            Err(HdfsError::ShortWrite { expected, written }) => {
                assert_eq!(expected, 10);
                assert_eq!(written, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(mini.calls("write"), 1);
        f.close().unwrap();
        assert_eq!(fs.info("/short").unwrap().size, 4);
    }

    #[test]
    fn test_write_failure_carries_native_code() {
        let mini = small_blocks();
        let fs = session(&mini);

        let mut f = fs
            .open("/f", OpenMode::Write, OpenOptions::default())
            .unwrap();
        mini.fail_next("write", errno::EIO);
        assert!(matches!(
            f.write(b"x"),
            Err(HdfsError::Io {
                op: "write",
                code: errno::EIO
            })
        ));
        assert_eq!(mini.calls("write"), 1);
    }

    #[test]
    fn test_oversized_read_request_is_capped() {
        let mini = MiniCluster::new(
            MiniClusterConfig::new("nn1", 9000).with_packet_size(4 * MAX_READ_LEN),
        );
        let fs = session(&mini);
        let size = MAX_READ_LEN + 10;
        fs.with_file("/big", OpenMode::Write, OpenOptions::default(), |f| {
            f.write(&vec![3u8; size])
        })
        .unwrap();

        let mut f = fs.open("/big", OpenMode::Read, OpenOptions::default()).unwrap();
        assert_eq!(f.read(usize::MAX).unwrap().len(), MAX_READ_LEN);
        assert_eq!(f.read(usize::MAX).unwrap().len(), 10);
        assert!(f.read(usize::MAX).unwrap().is_empty());
    }
}
