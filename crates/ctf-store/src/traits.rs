use ctf_types::Digest;

use crate::blob::BlobAccess;
use crate::error::StoreResult;

/// Content-addressed blob store inside one repository object.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once stored; the digest is the only key.
/// - Adding content whose digest is already present is a no-op.
/// - Concurrent reads are always safe.
/// - The store never interprets blob contents.
pub trait BlobStore: Send + Sync {
    /// Stream a blob into the store and return its digest.
    ///
    /// If the blob declares a digest, the streamed content must match it.
    fn add(&self, blob: &dyn BlobAccess) -> StoreResult<Digest>;

    /// Fetch a stored blob, labelled with `media_type`.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) if
    /// absent.
    fn get(&self, digest: &Digest, media_type: &str) -> StoreResult<Box<dyn BlobAccess>>;

    fn has(&self, digest: &Digest) -> StoreResult<bool>;

    /// Every stored digest, sorted.
    fn digests(&self) -> StoreResult<Vec<Digest>>;

    fn len(&self) -> StoreResult<usize> {
        Ok(self.digests()?.len())
    }

    fn is_read_only(&self) -> bool;
}
