//! **objio**: buffered stdio-style streams over arrow-rs
//! [ObjectStore](object_store::ObjectStore).
//!
//! Code written against `fopen`/`fread`/`fwrite`/`fseek` style calls can
//! use [Stdio] to read and write objects in a remote store as if they were
//! local files. Every open remote object gets a [BufferedHandle] that keeps
//! one read-ahead / write-back window in memory, so most small reads, writes
//! and seeks never leave the process.
//!
//! ```no_run
//! # use std::sync::Arc;
//! use object_store::local::LocalFileSystem;
//! use objio::{remote::ObjectStoreSession, Stdio};
//!
//! let store = Arc::new(LocalFileSystem::new_with_prefix("/data").unwrap());
//! let session = Arc::new(ObjectStoreSession::new(store));
//! let mut stdio = Stdio::builder(session).remote_prefix("store:").build();
//!
//! // Served through the cache.
//! let mut remote = stdio.open("store:runs/1/reads.bam", "r").unwrap();
//! // Plain local file.
//! let mut local = stdio.open("/tmp/reads.bam", "w").unwrap();
//!
//! let mut buf = vec![0_u8; 64 * 1024];
//! let len = buf.len();
//! loop {
//!     let n = stdio.read(&mut remote, &mut buf, 1, len).unwrap();
//!     if n == 0 {
//!         break;
//!     }
//!     stdio.write(&mut local, &buf[..n], 1, n).unwrap();
//! }
//! stdio.close(remote).unwrap();
//! stdio.close(local).unwrap();
//! stdio.terminate(0);
//! ```

pub mod error;
pub mod handle;
pub mod remote;
pub mod stdio;
pub mod table;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use handle::{BufferConfig, BufferedHandle};
pub use stdio::{Stdio, Stream};
