//! Stdio Builder
//!

use std::sync::Arc;

use super::{Stdio, DEFAULT_REMOTE_PREFIX};
use crate::handle::{BufferConfig, DEFAULT_INITIAL_BUFFER_SIZE, DEFAULT_MAX_BUFFER_SIZE};
use crate::remote::RemoteSession;
use crate::table::{HandleTable, DEFAULT_MAX_OPEN_HANDLES};

/// Builder for [Stdio]
pub struct StdioBuilder {
    session: Arc<dyn RemoteSession>,
    remote_prefix: String,
    max_open_handles: usize,

    initial_buffer_size: usize,
    max_buffer_size: usize,
}

impl StdioBuilder {
    pub(crate) fn new(session: Arc<dyn RemoteSession>) -> Self {
        Self {
            session,
            remote_prefix: DEFAULT_REMOTE_PREFIX.to_string(),
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Paths starting with `prefix` are opened through the remote session.
    ///
    /// Default is `"remote:"`.
    pub fn remote_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.remote_prefix = prefix.into();
        self
    }

    /// How many remote streams may be open at once.
    ///
    /// Default is 20.
    pub fn max_open_handles(&mut self, count: usize) -> &mut Self {
        self.max_open_handles = count;
        self
    }

    /// Buffer size of a freshly opened remote stream.
    ///
    /// Default is 64 KB.
    pub fn initial_buffer_size(&mut self, size: usize) -> &mut Self {
        self.initial_buffer_size = size;
        self
    }

    /// A stream's buffer never grows past this size; larger transfers go
    /// straight to the remote object.
    ///
    /// Default is 2 MB.
    pub fn max_buffer_size(&mut self, size: usize) -> &mut Self {
        self.max_buffer_size = size;
        self
    }

    /// # Panics
    /// If a buffer size is zero, or the initial size exceeds the maximum.
    pub fn build(&self) -> Stdio {
        assert!(
            self.initial_buffer_size > 0 && self.initial_buffer_size <= self.max_buffer_size,
            "invalid buffer sizes: initial {} max {}",
            self.initial_buffer_size,
            self.max_buffer_size
        );
        Stdio {
            session: self.session.clone(),
            handles: HandleTable::new(self.max_open_handles),
            remote_prefix: self.remote_prefix.clone(),
            buffer: BufferConfig {
                initial_capacity: self.initial_buffer_size,
                max_capacity: self.max_buffer_size,
            },
        }
    }
}
