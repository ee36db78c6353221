//! Persistent storage for meshpath services.
//!
//! Services keep durable state (chat history, wiki pages, user records)
//! keyed by their address. This crate provides:
//!
//! - [`Storage`]: the blocking `exists`/`read`/`write` contract.
//! - [`FileStorage`]: one file per address, named by the SHA-224 of the
//!   address, holding the serializer's encoding of the value.
//! - [`MemoryStorage`]: the same contract in memory.
//! - [`Persistence`]: the worker that runs storage calls on the blocking
//!   pool, in order, so no connection ever waits on the disk.

mod error;
mod persistence;
mod storage;

pub use error::StoreError;
pub use persistence::Persistence;
pub use storage::{FileStorage, MemoryStorage, Storage, storage_file_name};
