//! Error types
//!
//! Remote failures keep the `object_store` [`Error`](object_store::Error)
//! they came with, so callers can match on `NotFound` and friends exactly as
//! they would against a bare store.

use std::collections::TryReserveError;

use crate::table::HandleId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache buffer could not be allocated or grown.
    #[error("failed to allocate a cache buffer of {requested} bytes")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    /// A remote session primitive failed.
    #[error(transparent)]
    Remote(#[from] object_store::Error),

    #[error("too many open remote streams (capacity {capacity})")]
    TableFull { capacity: usize },

    #[error("{0} does not refer to an open stream")]
    BadHandle(HandleId),

    /// A seek would move before the start of the object.
    #[error("invalid seek to negative position {position}")]
    InvalidSeek { position: i128 },

    #[error("buffer of {len} bytes cannot hold {needed} bytes")]
    ShortBuffer { needed: usize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        match err {
            Error::Io(e) => e,
            Error::Remote(object_store::Error::NotFound { .. }) => {
                std::io::Error::new(ErrorKind::NotFound, err)
            }
            Error::InvalidSeek { .. } | Error::ShortBuffer { .. } => {
                std::io::Error::new(ErrorKind::InvalidInput, err)
            }
            Error::Allocation { .. } => std::io::Error::new(ErrorKind::OutOfMemory, err),
            _ => std::io::Error::other(err),
        }
    }
}
