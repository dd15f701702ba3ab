//! Object storage: the `get`/`put` interface the stages read from and write to.

pub mod fs;
pub mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

use crate::error::Result;

/// Binary blobs addressed by bucket and key.
///
/// Implementations must make a single `put` atomic per key: a concurrent
/// reader sees either the old or the new content, never a mix.
pub trait ObjectStore {
    /// Read a whole object.
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Create or replace an object.
    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        (**self).get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        (**self).put(bucket, key, data)
    }
}
