//! Remote session trait
//!
//! A [RemoteSession] is the one connection all cached streams share. It
//! exposes a descriptor-style view of an object store: open an object, then
//! read, write and seek through it by [ObjectId] until it is closed.

use std::fmt::{Debug, Display};
use std::io::SeekFrom;

use object_store::Result;

pub mod store;

pub use self::store::ObjectStoreSession;

/// Identifier of an object opened through a [RemoteSession].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// How an object is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    /// Interpret a C `fopen` style mode string.
    ///
    /// `"r+"` opens for reading and writing, anything starting with `"w"`
    /// for writing. Every other mode, including unrecognized ones, is
    /// read-only.
    pub fn parse(mode: &str) -> Self {
        if mode.starts_with("r+") {
            Self::ReadWrite
        } else if mode.starts_with('w') {
            Self::Write
        } else {
            Self::Read
        }
    }

    pub fn readable(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// [RemoteSession] trait.
///
/// All calls block until the remote answers. Failures are returned, never
/// raised.
pub trait RemoteSession: Send + Sync + Debug {
    /// Establish the session. Calling it again after success is a no-op.
    fn connect(&self) -> Result<()>;

    /// Open an existing object.
    ///
    /// # Returns
    /// - `Err(Error::NotFound)` if there is no object at `path`.
    fn open_object(&self, path: &str, mode: OpenMode) -> Result<ObjectId>;

    /// Create an empty object at `path` and open it for writing.
    fn create_object(&self, path: &str) -> Result<ObjectId>;

    /// Read up to `buf.len()` bytes at the object's current position.
    ///
    /// Returns the number of bytes read; `0` means end of object.
    fn read_object(&self, id: ObjectId, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf` at the object's current position.
    fn write_object(&self, id: ObjectId, buf: &[u8]) -> Result<usize>;

    /// Move the object's position, returning the new absolute position.
    fn seek_object(&self, id: ObjectId, pos: SeekFrom) -> Result<u64>;

    /// Query the object's current position.
    fn position(&self, id: ObjectId) -> Result<u64> {
        self.seek_object(id, SeekFrom::Current(0))
    }

    fn close_object(&self, id: ObjectId) -> Result<()>;

    /// Tear the session down.
    fn disconnect(&self) -> Result<()>;
}
