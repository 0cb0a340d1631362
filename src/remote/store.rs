//! [RemoteSession] over an arrow-rs [ObjectStore].
//!
//! Object stores only know whole-object `put`s and ranged `get`s, so this
//! session keeps a descriptor per open object:
//!
//! - read-only objects are read on demand with `get_range`, clamped to the
//!   size reported by `head` when the object was opened;
//! - writable objects are staged in memory when opened and `put` back in one
//!   piece when closed, if anything was written.
//!
//! ```
//! use std::sync::Arc;
//! use object_store::memory::InMemory;
//! use objio::remote::{ObjectStoreSession, OpenMode, RemoteSession};
//!
//! let session = ObjectStoreSession::new(Arc::new(InMemory::new()));
//! session.connect().unwrap();
//!
//! let id = session.create_object("data/greeting").unwrap();
//! session.write_object(id, b"hello").unwrap();
//! session.close_object(id).unwrap();
//!
//! let id = session.open_object("data/greeting", OpenMode::Read).unwrap();
//! let mut buf = [0_u8; 16];
//! assert_eq!(session.read_object(id, &mut buf).unwrap(), 5);
//! ```

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, info, warn};
use moka::sync::Cache;
use object_store::{path::Path, Error, ObjectMeta, ObjectStore, PutPayload, Result};
use tokio::runtime::Runtime;

use super::{ObjectId, OpenMode, RemoteSession};

const STORE: &str = "ObjectStoreSession";

/// How long object metadata from `head` is trusted.
const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(60);
const METADATA_CAPACITY: u64 = 1024;

/// [RemoteSession] implementation backed by an [ObjectStore].
#[derive(Debug)]
pub struct ObjectStoreSession {
    inner: Arc<dyn ObjectStore>,

    /// `head` results, keyed by location. Invalidated on every `put`.
    metadata: Cache<Path, ObjectMeta>,

    state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Drives the async store. `None` until connected.
    runtime: Option<Runtime>,

    next_id: u64,
    open: HashMap<ObjectId, Descriptor>,
}

#[derive(Debug)]
struct Descriptor {
    location: Path,
    mode: OpenMode,
    position: u64,
    content: Content,
}

#[derive(Debug)]
enum Content {
    /// Read from the store on demand.
    Remote { size: u64 },
    /// Held in memory until the descriptor is closed.
    Staged { data: BytesMut, modified: bool },
}

impl Content {
    fn len(&self) -> u64 {
        match self {
            Self::Remote { size } => *size,
            Self::Staged { data, .. } => data.len() as u64,
        }
    }
}

fn generic(msg: impl Into<String>) -> Error {
    Error::Generic {
        store: STORE,
        source: msg.into().into(),
    }
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|e| Error::Generic {
        store: STORE,
        source: Box::new(e),
    })
}

impl SessionState {
    fn runtime(&self) -> Result<&Runtime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| generic("session is not connected"))
    }

    /// Split borrow of the runtime and one open descriptor.
    fn descriptor(&mut self, id: ObjectId) -> Result<(&Runtime, &mut Descriptor)> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| generic("session is not connected"))?;
        let desc = self
            .open
            .get_mut(&id)
            .ok_or_else(|| generic(format!("{id} is not open")))?;
        Ok((runtime, desc))
    }

    fn insert(&mut self, desc: Descriptor) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.open.insert(id, desc);
        id
    }
}

impl std::fmt::Display for ObjectStoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectStoreSession(inner={})", self.inner)
    }
}

impl ObjectStoreSession {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self::with_metadata_ttl(inner, DEFAULT_METADATA_TTL)
    }

    /// Create a session that trusts cached object metadata for `ttl`.
    pub fn with_metadata_ttl(inner: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self {
            inner,
            metadata: Cache::builder()
                .max_capacity(METADATA_CAPACITY)
                .time_to_live(ttl)
                .build(),
            state: Mutex::default(),
        }
    }

    /// Number of objects currently open through this session.
    pub fn open_objects(&self) -> usize {
        self.lock().open.len()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().runtime.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn head(&self, runtime: &Runtime, location: &Path) -> Result<ObjectMeta> {
        if let Some(meta) = self.metadata.get(location) {
            return Ok(meta);
        }
        let meta = runtime.block_on(self.inner.head(location))?;
        self.metadata.insert(location.clone(), meta.clone());
        Ok(meta)
    }
}

impl RemoteSession for ObjectStoreSession {
    fn connect(&self) -> Result<()> {
        let mut state = self.lock();
        if state.runtime.is_some() {
            return Ok(());
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Generic {
                store: STORE,
                source: Box::new(e),
            })?;
        state.runtime = Some(runtime);
        info!("Connected to {}", self.inner);
        Ok(())
    }

    fn open_object(&self, path: &str, mode: OpenMode) -> Result<ObjectId> {
        debug!("open_object: {} {:?}", path, mode);
        let location = Path::parse(path)?;
        let mut state = self.lock();
        let runtime = state.runtime()?;

        let content = if mode.writable() {
            let data = runtime.block_on(async { self.inner.get(&location).await?.bytes().await })?;
            Content::Staged {
                data: BytesMut::from(&data[..]),
                modified: false,
            }
        } else {
            let meta = self.head(runtime, &location)?;
            Content::Remote {
                size: meta.size as u64,
            }
        };

        Ok(state.insert(Descriptor {
            location,
            mode,
            position: 0,
            content,
        }))
    }

    fn create_object(&self, path: &str) -> Result<ObjectId> {
        debug!("create_object: {}", path);
        let location = Path::parse(path)?;
        let mut state = self.lock();
        let runtime = state.runtime()?;

        runtime.block_on(self.inner.put(&location, PutPayload::from(bytes::Bytes::new())))?;
        self.metadata.invalidate(&location);

        Ok(state.insert(Descriptor {
            location,
            mode: OpenMode::Write,
            position: 0,
            content: Content::Staged {
                data: BytesMut::new(),
                modified: false,
            },
        }))
    }

    fn read_object(&self, id: ObjectId, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        let (runtime, desc) = state.descriptor(id)?;
        if !desc.mode.readable() {
            return Err(generic(format!("{id} is not open for reading")));
        }

        let start = desc.position;
        let len = desc.content.len();
        if start >= len || buf.is_empty() {
            return Ok(0);
        }
        let end = std::cmp::min(start + buf.len() as u64, len);

        let n = match &desc.content {
            Content::Remote { .. } => {
                let bytes = runtime.block_on(
                    self.inner
                        .get_range(&desc.location, to_usize(start)?..to_usize(end)?),
                )?;
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                n
            }
            Content::Staged { data, .. } => {
                let range = to_usize(start)?..to_usize(end)?;
                let n = range.len();
                buf[..n].copy_from_slice(&data[range]);
                n
            }
        };
        desc.position += n as u64;
        debug!("read_object: {} {}@{}", id, n, start);
        Ok(n)
    }

    fn write_object(&self, id: ObjectId, buf: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        let (_, desc) = state.descriptor(id)?;
        if !desc.mode.writable() {
            return Err(generic(format!("{id} is not open for writing")));
        }
        let Content::Staged { data, modified } = &mut desc.content else {
            return Err(generic(format!("{id} has no staged content")));
        };
        if buf.is_empty() {
            return Ok(0);
        }

        let pos = to_usize(desc.position)?;
        if data.len() < pos {
            data.resize(pos, 0);
        }
        let overlap = std::cmp::min(buf.len(), data.len() - pos);
        data[pos..pos + overlap].copy_from_slice(&buf[..overlap]);
        data.extend_from_slice(&buf[overlap..]);
        *modified = true;

        desc.position += buf.len() as u64;
        debug!("write_object: {} {}@{}", id, buf.len(), pos);
        Ok(buf.len())
    }

    fn seek_object(&self, id: ObjectId, pos: SeekFrom) -> Result<u64> {
        let mut state = self.lock();
        let (_, desc) = state.descriptor(id)?;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => i128::from(desc.position) + i128::from(offset),
            SeekFrom::End(offset) => i128::from(desc.content.len()) + i128::from(offset),
        };
        desc.position = u64::try_from(target)
            .map_err(|_| generic(format!("invalid seek of {id} to {target}")))?;
        Ok(desc.position)
    }

    fn close_object(&self, id: ObjectId) -> Result<()> {
        debug!("close_object: {}", id);
        let mut state = self.lock();
        let runtime = state.runtime()?;
        let desc = state
            .open
            .get(&id)
            .ok_or_else(|| generic(format!("{id} is not open")))?;
        // Put before forgetting the descriptor, so a failed upload can be retried.
        if let Descriptor {
            location,
            content: Content::Staged { data, modified: true },
            ..
        } = desc
        {
            let payload = PutPayload::from(data.clone().freeze());
            runtime.block_on(self.inner.put(location, payload))?;
            self.metadata.invalidate(location);
        }
        state.open.remove(&id);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.open.is_empty() {
            warn!(
                "Disconnecting with {} objects still open, unsaved writes are lost",
                state.open.len()
            );
            state.open.clear();
        }
        if state.runtime.take().is_some() {
            info!("Disconnected from {}", self.inner);
        }
        Ok(())
    }
}
