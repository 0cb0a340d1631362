//! Buffered handle
//!
//! A [BufferedHandle] fronts one open remote object with a single
//! [WindowBuffer]. The same window serves as read-ahead cache and as
//! write-back cache, tracked by an explicit clean/dirty tag. Requests the
//! window can answer never reach the remote session:
//!
//! - reads are served from unread bytes, refilling the window (growing it if
//!   needed) when they run out;
//! - writes land in the window and are flushed when it fills up;
//! - seeks inside the window just move the cursor.
//!
//! Transfers too large for the biggest allowed window go straight between
//! the caller's buffer and the remote object.

use std::io::{self, SeekFrom};
use std::sync::Arc;

use log::{debug, warn};

use crate::remote::{ObjectId, OpenMode, RemoteSession};
use crate::window::WindowBuffer;
use crate::{Error, Result};

/// Default initial buffer size is 64 KB
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 64 * 1024;
/// Default maximum buffer size is 2 MB
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Added on top of twice the requested size when a window grows.
const GROWTH_SLACK: usize = 8;

/// Window sizes for a [BufferedHandle].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Size of the window when the handle is opened.
    pub initial_capacity: usize,
    /// Largest size the window may grow to. Larger transfers bypass it.
    pub max_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_BUFFER_SIZE,
            max_capacity: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheState {
    /// The window matches the remote object.
    Clean,
    /// The window holds bytes the remote object has not seen yet.
    Dirty,
}

/// A cached stream over one remote object.
#[derive(Debug)]
pub struct BufferedHandle {
    session: Arc<dyn RemoteSession>,
    object: ObjectId,
    path: String,

    /// Object offset of the first byte of the window.
    window_base: u64,
    window: WindowBuffer,

    /// How far past `window_base` the remote position is.
    ///
    /// Equals the window's extent whenever the handle is clean.
    synced: usize,

    state: CacheState,
}

impl BufferedHandle {
    /// Open the object at `path` through `session`.
    ///
    /// Opening a missing object for writing creates it.
    pub fn open(
        session: Arc<dyn RemoteSession>,
        path: &str,
        mode: OpenMode,
        config: BufferConfig,
    ) -> Result<Self> {
        debug!("open: {} {:?}", path, mode);
        let object = match session.open_object(path, mode) {
            Err(object_store::Error::NotFound { .. }) if mode == OpenMode::Write => {
                session.create_object(path)?
            }
            other => other?,
        };

        let window = match WindowBuffer::new(config.initial_capacity, config.max_capacity) {
            Ok(window) => window,
            Err(e) => {
                if let Err(close_err) = session.close_object(object) {
                    warn!("Failed to close {} after allocation failure: {}", path, close_err);
                }
                return Err(e);
            }
        };

        Ok(Self {
            session,
            object,
            path: path.to_string(),
            window_base: 0,
            window,
            synced: 0,
            state: CacheState::Clean,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn window_base(&self) -> u64 {
        self.window_base
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn cursor(&self) -> usize {
        self.window.cursor()
    }

    pub fn unread(&self) -> usize {
        self.window.unread()
    }

    pub fn is_dirty(&self) -> bool {
        self.state == CacheState::Dirty
    }

    /// Read up to `dest.len()` bytes.
    ///
    /// Returns fewer bytes only at the end of the object, and `0` once there.
    /// If the window already supplied some bytes and fetching the rest fails,
    /// those bytes are returned and the failure is left for the next call.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        self.flush()?;

        let cached = self.window.take(dest);
        if cached == dest.len() {
            return Ok(cached);
        }

        let fetched = match self.fetch(&mut dest[cached..]) {
            Ok(n) => n,
            Err(e) if cached > 0 => {
                debug!(
                    "read: {} returning {} cached bytes, fetch failed: {}",
                    self.path, cached, e
                );
                0
            }
            Err(e) => return Err(e),
        };
        debug!(
            "read: {} {} cached + {} fetched",
            self.path, cached, fetched
        );
        Ok(cached + fetched)
    }

    /// Fetch into `dest` once the window is used up, through a refilled
    /// window or straight from the object.
    fn fetch(&mut self, dest: &mut [u8]) -> Result<usize> {
        let wanted = dest.len().saturating_mul(2).saturating_add(GROWTH_SLACK);
        if wanted > self.window.limit() {
            return self.read_direct(dest);
        }
        self.window.grow(wanted)?;
        self.fill()?;
        Ok(self.window.take(dest))
    }

    /// Refill the window from the remote position, which is the logical
    /// position once the window is used up.
    fn fill(&mut self) -> Result<usize> {
        debug_assert!(self.state == CacheState::Clean && self.window.unread() == 0);
        let position = self.session.position(self.object)?;
        self.window.clear();
        self.window_base = position;
        self.synced = 0;

        let (session, object) = (&self.session, self.object);
        let n = self.window.refill(|buf| session.read_object(object, buf))?;
        self.synced = n;
        Ok(n)
    }

    /// Read into `dest` without going through the window.
    fn read_direct(&mut self, dest: &mut [u8]) -> Result<usize> {
        debug!("read: {} bypassing window for {} bytes", self.path, dest.len());
        self.settle_window();
        let n = self.session.read_object(self.object, dest)?;
        self.anchor_after_direct(n);
        Ok(n)
    }

    /// Write all of `src`, returning how many bytes were accepted.
    ///
    /// Bytes that made it into the window count as written even if pushing
    /// the window out afterwards fails; the failure is left for the next call.
    pub fn write(&mut self, src: &[u8]) -> Result<usize> {
        if src.is_empty() {
            return Ok(0);
        }

        let cached = self.window.put(src);
        if cached > 0 {
            self.state = CacheState::Dirty;
        }
        if cached == src.len() {
            return Ok(cached);
        }

        match self.write_past_window(&src[cached..]) {
            Ok(n) => Ok(cached + n),
            Err(e) if cached > 0 => {
                debug!(
                    "write: {} accepted {} bytes, overflow failed: {}",
                    self.path, cached, e
                );
                Ok(cached)
            }
            Err(e) => Err(e),
        }
    }

    /// Push out the full window, then take `rest` into a fresh one or send it
    /// straight to the object.
    fn write_past_window(&mut self, rest: &[u8]) -> Result<usize> {
        self.flush()?;
        self.rebase()?;

        if rest.len() > self.window.limit() {
            debug!("write: {} bypassing window for {} bytes", self.path, rest.len());
            let n = self.session.write_object(self.object, rest)?;
            self.anchor_after_direct(n);
            return Ok(n);
        }

        if rest.len() > self.window.capacity() {
            let wanted = std::cmp::min(
                rest.len().saturating_mul(2).saturating_add(GROWTH_SLACK),
                self.window.limit(),
            );
            self.window.grow(wanted)?;
        }
        self.state = CacheState::Dirty;
        let n = self.window.put(rest);
        debug_assert_eq!(n, rest.len());
        Ok(n)
    }

    /// Empty the window and anchor it at the remote position.
    fn rebase(&mut self) -> Result<()> {
        debug_assert!(self.state == CacheState::Clean);
        let position = self.session.position(self.object)?;
        self.window.clear();
        self.synced = 0;
        self.window_base = position;
        Ok(())
    }

    /// Empty a clean, used-up window without a remote call. The logical
    /// position becomes its base.
    fn settle_window(&mut self) {
        debug_assert!(self.state == CacheState::Clean && self.window.unread() == 0);
        self.window_base = self.tell();
        self.window.clear();
        self.synced = 0;
    }

    /// Re-anchor the empty window after `moved` bytes went directly between
    /// the caller and the object.
    fn anchor_after_direct(&mut self, moved: usize) {
        match self.session.position(self.object) {
            Ok(position) => self.window_base = position,
            Err(e) => {
                warn!(
                    "position of {} unavailable after direct transfer, advancing by {}: {}",
                    self.path, moved, e
                );
                self.window_base += moved as u64;
            }
        }
    }

    /// Write the window back if it is dirty.
    ///
    /// The whole occupied window is written, starting at `window_base`. The
    /// cursor and window position are left alone.
    pub fn flush(&mut self) -> Result<()> {
        if self.state == CacheState::Clean {
            return Ok(());
        }

        if self.synced != 0 {
            // A refill moved the remote position past the window start.
            self.session
                .seek_object(self.object, SeekFrom::Start(self.window_base))?;
            self.synced = 0;
        }

        let data = self.window.occupied();
        let written = self.session.write_object(self.object, data)?;
        self.synced = written;
        if written != data.len() {
            return Err(Error::Remote(object_store::Error::Generic {
                store: "BufferedHandle",
                source: format!(
                    "short write to {}: {} of {} bytes",
                    self.path,
                    written,
                    data.len()
                )
                .into(),
            }));
        }

        debug!("flush: {} {}@{}", self.path, written, self.window_base);
        self.state = CacheState::Clean;
        Ok(())
    }

    /// The logical position of the stream, without a remote call.
    ///
    /// Use [remote_position()](Self::remote_position) to query the object itself.
    pub fn tell(&self) -> u64 {
        self.window_base + self.window.cursor() as u64
    }

    /// Ask the remote session for the object's position.
    ///
    /// This is where the next refill or flush lands, not necessarily
    /// [tell()](Self::tell).
    pub fn remote_position(&self) -> Result<u64> {
        Ok(self.session.position(self.object)?)
    }

    /// Move the stream position, returning the new position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if let Some(delta) = self.shift_within_window(pos) {
            self.window.shift(delta);
            return Ok(self.tell());
        }

        // The remote position runs ahead of the cursor after a refill, so
        // relative seeks are resolved against the logical position.
        let target = match pos {
            SeekFrom::Current(offset) => {
                let position = i128::from(self.tell()) + i128::from(offset);
                let start =
                    u64::try_from(position).map_err(|_| Error::InvalidSeek { position })?;
                SeekFrom::Start(start)
            }
            other => other,
        };

        self.flush()?;
        self.window_base = self.session.seek_object(self.object, target)?;
        self.window.clear();
        self.synced = 0;
        debug!("seek: {} {:?} -> {}", self.path, pos, self.window_base);
        Ok(self.window_base)
    }

    /// Cursor adjustment for `pos` if it lands inside the window.
    fn shift_within_window(&self, pos: SeekFrom) -> Option<i64> {
        match pos {
            SeekFrom::Start(offset) => {
                let end = self.window_base + self.window.extent() as u64;
                if offset < self.window_base || offset >= end {
                    return None;
                }
                let index = (offset - self.window_base) as i64;
                Some(index - self.window.cursor() as i64)
            }
            SeekFrom::Current(0) => Some(0),
            SeekFrom::Current(offset) if offset > 0 => {
                self.window.can_shift(offset).then_some(offset)
            }
            SeekFrom::Current(offset) => {
                let lands = i128::from(offset) + self.window.cursor() as i128;
                (lands > 0 && self.window.can_shift(offset)).then_some(offset)
            }
            // The object length is not tracked locally.
            SeekFrom::End(_) => None,
        }
    }

    /// Write one byte, returning it.
    pub fn putc(&mut self, byte: u8) -> Result<u8> {
        self.write(&[byte])?;
        Ok(byte)
    }

    /// Read one byte, or `None` at the end of the object.
    pub fn getc(&mut self) -> Result<Option<u8>> {
        let mut byte = [0_u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Flush and close the remote object.
    ///
    /// The remote object is closed even if the flush fails; the first error
    /// is returned.
    pub fn close(mut self) -> Result<()> {
        debug!("close: {}", self.path);
        let flushed = self.flush();
        let closed = self.session.close_object(self.object).map_err(Error::from);
        flushed.and(closed)
    }
}

impl Drop for BufferedHandle {
    fn drop(&mut self) {
        if self.state == CacheState::Dirty {
            warn!(
                "{} dropped with {} unflushed bytes",
                self.path,
                self.window.extent()
            );
        }
    }
}

impl io::Read for BufferedHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(BufferedHandle::read(self, buf)?)
    }
}

impl io::Write for BufferedHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(BufferedHandle::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(BufferedHandle::flush(self)?)
    }
}

impl io::Seek for BufferedHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(BufferedHandle::seek(self, pos)?)
    }
}
