//! Test doubles.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use object_store::{memory::InMemory, Error, Result};

use crate::remote::{ObjectId, ObjectStoreSession, OpenMode, RemoteSession};

/// Number of calls made per session primitive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallCount {
    pub opens: usize,
    pub creates: usize,
    pub reads: usize,
    pub writes: usize,
    pub seeks: usize,
    pub positions: usize,
    pub closes: usize,
}

impl CallCount {
    pub fn total(&self) -> usize {
        self.opens
            + self.creates
            + self.reads
            + self.writes
            + self.seeks
            + self.positions
            + self.closes
    }

    /// Calls made after `earlier` was taken.
    pub fn since(&self, earlier: CallCount) -> CallCount {
        CallCount {
            opens: self.opens - earlier.opens,
            creates: self.creates - earlier.creates,
            reads: self.reads - earlier.reads,
            writes: self.writes - earlier.writes,
            seeks: self.seeks - earlier.seeks,
            positions: self.positions - earlier.positions,
            closes: self.closes - earlier.closes,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    creates: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    seeks: AtomicUsize,
    positions: AtomicUsize,
    closes: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn injected(what: &str) -> Error {
    Error::Generic {
        store: "CountingSession",
        source: format!("injected {what} failure").into(),
    }
}

/// [ObjectStoreSession] over an [InMemory] store that counts every
/// primitive and can be told to fail writes or position queries.
#[derive(Debug)]
pub(crate) struct CountingSession {
    inner: ObjectStoreSession,
    counters: Counters,
    fail_writes: AtomicBool,
    fail_positions: AtomicBool,
}

impl CountingSession {
    /// A connected session over an empty store.
    pub fn new() -> Arc<Self> {
        let inner = ObjectStoreSession::new(Arc::new(InMemory::new()));
        inner.connect().unwrap();
        Arc::new(Self {
            inner,
            counters: Counters::default(),
            fail_writes: AtomicBool::new(false),
            fail_positions: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> CallCount {
        let c = &self.counters;
        CallCount {
            opens: c.opens.load(Ordering::SeqCst),
            creates: c.creates.load(Ordering::SeqCst),
            reads: c.reads.load(Ordering::SeqCst),
            writes: c.writes.load(Ordering::SeqCst),
            seeks: c.seeks.load(Ordering::SeqCst),
            positions: c.positions.load(Ordering::SeqCst),
            closes: c.closes.load(Ordering::SeqCst),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_positions(&self, fail: bool) {
        self.fail_positions.store(fail, Ordering::SeqCst);
    }

    pub fn open_objects(&self) -> usize {
        self.inner.open_objects()
    }

    /// Store `data` at `path` without counting.
    pub fn put(&self, path: &str, data: &[u8]) {
        let id = self.inner.create_object(path).unwrap();
        self.inner.write_object(id, data).unwrap();
        self.inner.close_object(id).unwrap();
    }

    /// Read the whole object at `path` without counting.
    pub fn get(&self, path: &str) -> Vec<u8> {
        let id = self.inner.open_object(path, OpenMode::Read).unwrap();
        let mut data = vec![];
        let mut buf = [0_u8; 4096];
        loop {
            let n = self.inner.read_object(id, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
        }
        self.inner.close_object(id).unwrap();
        data
    }
}

impl RemoteSession for CountingSession {
    fn connect(&self) -> Result<()> {
        self.inner.connect()
    }

    fn open_object(&self, path: &str, mode: OpenMode) -> Result<ObjectId> {
        bump(&self.counters.opens);
        self.inner.open_object(path, mode)
    }

    fn create_object(&self, path: &str) -> Result<ObjectId> {
        bump(&self.counters.creates);
        self.inner.create_object(path)
    }

    fn read_object(&self, id: ObjectId, buf: &mut [u8]) -> Result<usize> {
        bump(&self.counters.reads);
        self.inner.read_object(id, buf)
    }

    fn write_object(&self, id: ObjectId, buf: &[u8]) -> Result<usize> {
        bump(&self.counters.writes);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.write_object(id, buf)
    }

    fn seek_object(&self, id: ObjectId, pos: SeekFrom) -> Result<u64> {
        bump(&self.counters.seeks);
        self.inner.seek_object(id, pos)
    }

    fn position(&self, id: ObjectId) -> Result<u64> {
        bump(&self.counters.positions);
        if self.fail_positions.load(Ordering::SeqCst) {
            return Err(injected("position"));
        }
        self.inner.position(id)
    }

    fn close_object(&self, id: ObjectId) -> Result<()> {
        bump(&self.counters.closes);
        self.inner.close_object(id)
    }

    fn disconnect(&self) -> Result<()> {
        self.inner.disconnect()
    }
}

/// `len` bytes of a recognizable pattern.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
