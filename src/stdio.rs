//! Stdio-compatible call surface
//!
//! [Stdio] offers the `fopen` family over two kinds of streams: paths that
//! start with the remote prefix are opened through the shared
//! [RemoteSession] and cached by a [BufferedHandle]; every other path is an
//! ordinary local file. Callers use the same calls for both.
//!
//! ```
//! use std::io::SeekFrom;
//! use std::sync::Arc;
//! use object_store::memory::InMemory;
//! use objio::{remote::ObjectStoreSession, Stdio};
//!
//! let session = Arc::new(ObjectStoreSession::new(Arc::new(InMemory::new())));
//! let mut stdio = Stdio::builder(session).remote_prefix("mem:").build();
//!
//! let mut stream = stdio.open("mem:reads/sample.txt", "w").unwrap();
//! assert_eq!(stdio.write(&mut stream, b"ACGTACGT", 4, 2).unwrap(), 2);
//! stdio.close(stream).unwrap();
//!
//! let mut stream = stdio.open("mem:reads/sample.txt", "r").unwrap();
//! stdio.seek(&mut stream, SeekFrom::Start(4)).unwrap();
//! assert_eq!(stdio.getc(&mut stream).unwrap(), Some(b'A'));
//! assert_eq!(stdio.tell(&mut stream).unwrap(), 5);
//! stdio.close(stream).unwrap();
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use log::{debug, error, warn};

mod builder;

pub use self::builder::StdioBuilder;
use crate::handle::{BufferConfig, BufferedHandle};
use crate::remote::{OpenMode, RemoteSession};
use crate::table::{HandleId, HandleTable};
use crate::{Error, Result};

/// Paths with this prefix are remote by default.
pub const DEFAULT_REMOTE_PREFIX: &str = "remote:";

/// An open stream.
#[derive(Debug)]
pub enum Stream {
    /// A remote object, cached in the [Stdio] handle table.
    Cached(HandleId),
    /// A local file, passed straight through.
    Local(File),
}

/// Dispatches stdio-style calls to cached remote streams or local files.
#[derive(Debug)]
pub struct Stdio {
    session: Arc<dyn RemoteSession>,
    handles: HandleTable<BufferedHandle>,
    remote_prefix: String,
    buffer: BufferConfig,
}

impl Stdio {
    /// Create a [`Builder`](StdioBuilder) to construct [Stdio].
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use object_store::memory::InMemory;
    /// use objio::{remote::ObjectStoreSession, Stdio};
    ///
    /// let session = Arc::new(ObjectStoreSession::new(Arc::new(InMemory::new())));
    /// let stdio = Stdio::builder(session)
    ///     .remote_prefix("irods:")
    ///     .max_open_handles(8)
    ///     .build();
    /// ```
    pub fn builder(session: Arc<dyn RemoteSession>) -> StdioBuilder {
        StdioBuilder::new(session)
    }

    /// [Stdio] with default settings.
    pub fn new(session: Arc<dyn RemoteSession>) -> Self {
        Self::builder(session).build()
    }

    pub fn remote_prefix(&self) -> &str {
        &self.remote_prefix
    }

    pub fn max_open_handles(&self) -> usize {
        self.handles.capacity()
    }

    pub fn buffer_config(&self) -> BufferConfig {
        self.buffer
    }

    /// Number of remote streams currently open.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Open `path` with a C `fopen` mode.
    ///
    /// The session is connected on the first remote open.
    pub fn open(&mut self, path: &str, mode: &str) -> Result<Stream> {
        debug!("open: {} {}", path, mode);
        let Some(remote_path) = path.strip_prefix(self.remote_prefix.as_str()) else {
            return Ok(Stream::Local(local_options(mode).open(path)?));
        };

        // Refuse before touching the remote side, so nothing is left open.
        if self.handles.is_full() {
            return Err(Error::TableFull {
                capacity: self.handles.capacity(),
            });
        }
        self.session.connect()?;
        let handle = BufferedHandle::open(
            self.session.clone(),
            remote_path,
            OpenMode::parse(mode),
            self.buffer,
        )?;
        Ok(Stream::Cached(self.handles.register(handle)?))
    }

    fn handle(&mut self, id: HandleId) -> Result<&mut BufferedHandle> {
        self.handles.lookup(id).ok_or(Error::BadHandle(id))
    }

    /// Read up to `item_count` items of `item_size` bytes into `buf`.
    ///
    /// Returns the number of whole items read, fewer at end of stream.
    pub fn read(
        &mut self,
        stream: &mut Stream,
        buf: &mut [u8],
        item_size: usize,
        item_count: usize,
    ) -> Result<usize> {
        if item_size == 0 {
            return Ok(0);
        }
        let len = items_len(buf.len(), item_size, item_count)?;
        let dest = &mut buf[..len];
        let n = match stream {
            Stream::Cached(id) => self.handle(*id)?.read(dest)?,
            Stream::Local(file) => read_full(file, dest)?,
        };
        Ok(n / item_size)
    }

    /// Write `item_count` items of `item_size` bytes from `buf`.
    pub fn write(
        &mut self,
        stream: &mut Stream,
        buf: &[u8],
        item_size: usize,
        item_count: usize,
    ) -> Result<usize> {
        if item_size == 0 {
            return Ok(0);
        }
        let len = items_len(buf.len(), item_size, item_count)?;
        let src = &buf[..len];
        let n = match stream {
            Stream::Cached(id) => self.handle(*id)?.write(src)?,
            Stream::Local(file) => {
                file.write_all(src)?;
                len
            }
        };
        Ok(n / item_size)
    }

    pub fn seek(&mut self, stream: &mut Stream, pos: SeekFrom) -> Result<()> {
        match stream {
            Stream::Cached(id) => self.handle(*id)?.seek(pos)?,
            Stream::Local(file) => file.seek(pos)?,
        };
        Ok(())
    }

    pub fn tell(&mut self, stream: &mut Stream) -> Result<u64> {
        match stream {
            Stream::Cached(id) => Ok(self.handle(*id)?.tell()),
            Stream::Local(file) => Ok(file.stream_position()?),
        }
    }

    pub fn flush(&mut self, stream: &mut Stream) -> Result<()> {
        match stream {
            Stream::Cached(id) => self.handle(*id)?.flush(),
            Stream::Local(file) => Ok(file.flush()?),
        }
    }

    /// Write one byte, returning it.
    pub fn putc(&mut self, byte: u8, stream: &mut Stream) -> Result<u8> {
        match stream {
            Stream::Cached(id) => self.handle(*id)?.putc(byte),
            Stream::Local(file) => {
                file.write_all(&[byte])?;
                Ok(byte)
            }
        }
    }

    /// Read one byte, or `None` at end of stream.
    pub fn getc(&mut self, stream: &mut Stream) -> Result<Option<u8>> {
        match stream {
            Stream::Cached(id) => self.handle(*id)?.getc(),
            Stream::Local(file) => {
                let mut byte = [0_u8; 1];
                match read_full(file, &mut byte)? {
                    0 => Ok(None),
                    _ => Ok(Some(byte[0])),
                }
            }
        }
    }

    /// Close `stream`, flushing cached writes first.
    pub fn close(&mut self, stream: Stream) -> Result<()> {
        match stream {
            Stream::Cached(id) => {
                let handle = self.handles.release(id).ok_or(Error::BadHandle(id))?;
                handle.close()
            }
            Stream::Local(file) => {
                drop(file);
                Ok(())
            }
        }
    }

    /// Close every remote stream and disconnect the session.
    ///
    /// All streams are closed even if some fail; the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut result = Ok(());
        for (id, handle) in self.handles.drain() {
            if let Err(e) = handle.close() {
                warn!("Failed to close {}: {}", id, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        self.session.disconnect()?;
        result
    }

    /// [Shut down](Self::shutdown) and exit the process with `code`.
    pub fn terminate(mut self, code: i32) -> ! {
        debug!("terminate: {}", code);
        if let Err(e) = self.shutdown() {
            error!("Shutdown before exit failed: {}", e);
        }
        std::process::exit(code)
    }
}

/// Byte length of `item_count` items, checked against a buffer of `len`.
fn items_len(len: usize, item_size: usize, item_count: usize) -> Result<usize> {
    match item_size.checked_mul(item_count) {
        Some(needed) if needed <= len => Ok(needed),
        Some(needed) => Err(Error::ShortBuffer { needed, len }),
        None => Err(Error::ShortBuffer {
            needed: usize::MAX,
            len,
        }),
    }
}

/// `OpenOptions` for a C `fopen` mode. Unrecognized modes open read-only.
fn local_options(mode: &str) -> OpenOptions {
    let mut options = OpenOptions::new();
    let update = mode.contains('+');
    match mode.chars().next() {
        Some('w') => options.write(true).create(true).truncate(true).read(update),
        Some('a') => options.append(true).create(true).read(update),
        Some('r') if update => options.read(true).write(true),
        _ => options.read(true),
    };
    options
}

/// Read until `buf` is full or the file ends.
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
