//! Bounded, growable byte window
//!
//! [WindowBuffer] owns the bytes of one cached window and the two counters
//! that describe them:
//!
//! ```text
//! 0            cursor          cursor + unread        capacity
//! |-- consumed --|---- unread ----|------- spare -------|
//! ```
//!
//! Every mutation re-checks `cursor + unread <= capacity` and panics if it
//! does not hold: a window that lies about its contents would hand out or
//! flush the wrong bytes.

use crate::{Error, Result};

#[derive(Debug)]
pub struct WindowBuffer {
    data: Vec<u8>,
    cursor: usize,
    unread: usize,
    /// Largest capacity the window may grow to.
    limit: usize,
}

impl WindowBuffer {
    /// Allocate an empty window of `capacity` bytes that may grow up to `limit`.
    pub fn new(capacity: usize, limit: usize) -> Result<Self> {
        assert!(
            capacity <= limit,
            "initial capacity {capacity} exceeds limit {limit}"
        );
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|source| Error::Allocation {
                requested: capacity,
                source,
            })?;
        data.resize(capacity, 0);
        Ok(Self {
            data,
            cursor: 0,
            unread: 0,
            limit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Bytes of the window that hold data: `cursor + unread`.
    pub fn extent(&self) -> usize {
        self.cursor + self.unread
    }

    /// Space left after the cursor.
    pub fn spare(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// The occupied part of the window, from its start.
    pub fn occupied(&self) -> &[u8] {
        &self.data[..self.extent()]
    }

    /// Forget the window's contents, keeping the allocation.
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.unread = 0;
    }

    /// Grow to `capacity` bytes, keeping existing content.
    ///
    /// A no-op if the window is already that large. Growing past the limit is
    /// a caller bug.
    pub fn grow(&mut self, capacity: usize) -> Result<()> {
        assert!(
            capacity <= self.limit,
            "window growth to {capacity} exceeds limit {}",
            self.limit
        );
        if capacity <= self.capacity() {
            return Ok(());
        }
        self.data
            .try_reserve_exact(capacity - self.data.len())
            .map_err(|source| Error::Allocation {
                requested: capacity,
                source,
            })?;
        self.data.resize(capacity, 0);
        self.check();
        Ok(())
    }

    /// Copy unread bytes into `dest`, returning how many were copied.
    pub fn take(&mut self, dest: &mut [u8]) -> usize {
        let n = std::cmp::min(self.unread, dest.len());
        dest[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        self.unread -= n;
        self.check();
        n
    }

    /// Copy as much of `src` as fits at the cursor, returning how much was
    /// copied. Unread bytes that get overwritten stop counting as unread.
    pub fn put(&mut self, src: &[u8]) -> usize {
        let n = std::cmp::min(self.spare(), src.len());
        self.data[self.cursor..self.cursor + n].copy_from_slice(&src[..n]);
        self.cursor += n;
        self.unread = self.unread.saturating_sub(n);
        self.check();
        n
    }

    /// Hand the whole allocation to `fill`, which returns how many bytes it
    /// produced. Those bytes become the window's unread content.
    pub fn refill<E>(
        &mut self,
        fill: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        self.clear();
        let n = fill(&mut self.data)?;
        assert!(
            n <= self.capacity(),
            "refill produced {n} bytes into a window of {}",
            self.capacity()
        );
        self.unread = n;
        self.check();
        Ok(n)
    }

    /// Whether moving the cursor by `delta` keeps it inside the occupied part.
    pub fn can_shift(&self, delta: i64) -> bool {
        match usize::try_from(delta.unsigned_abs()) {
            Ok(n) if delta >= 0 => n <= self.unread,
            Ok(n) => n <= self.cursor,
            Err(_) => false,
        }
    }

    /// Move the cursor by `delta` inside the occupied part.
    pub fn shift(&mut self, delta: i64) {
        assert!(
            self.can_shift(delta),
            "shift by {delta} leaves window (cursor {}, unread {})",
            self.cursor,
            self.unread
        );
        // `can_shift` guarantees the magnitude fits in usize.
        let n = delta.unsigned_abs() as usize;
        if delta >= 0 {
            self.cursor += n;
            self.unread -= n;
        } else {
            self.cursor -= n;
            self.unread += n;
        }
        self.check();
    }

    fn check(&self) {
        assert!(
            self.cursor <= self.capacity() && self.cursor + self.unread <= self.capacity(),
            "window out of bounds: cursor {} unread {} capacity {}",
            self.cursor,
            self.unread,
            self.capacity()
        );
    }
}
