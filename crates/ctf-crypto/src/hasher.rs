use std::io::{self, Read, Write};

use ctf_types::{Digest, DigestAlgorithm};
use sha2::{Digest as _, Sha256, Sha512};

enum State {
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Incremental content hasher producing an algorithm-tagged [`Digest`].
///
/// Also counts the bytes fed into it, so a single pass over a stream yields
/// both the digest and the size of a descriptor.
pub struct ContentHasher {
    state: State,
    algorithm: DigestAlgorithm,
    len: u64,
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm {
            DigestAlgorithm::Sha256 => State::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => State::Sha512(Sha512::new()),
        };
        Self {
            state,
            algorithm,
            len: 0,
        }
    }

    /// SHA-256 hasher, the default for stored blobs.
    pub fn sha256() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Sha256(h) => h.update(data),
            State::Sha512(h) => h.update(data),
        }
        self.len += data.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish hashing, returning the digest and the total byte count.
    pub fn finish(self) -> (Digest, u64) {
        let hash = match self.state {
            State::Sha256(h) => h.finalize().to_vec(),
            State::Sha512(h) => h.finalize().to_vec(),
        };
        let digest = Digest::from_hash(self.algorithm, &hash)
            .unwrap_or_else(|_| unreachable!("hash length always matches its algorithm"));
        (digest, self.len)
    }
}

/// Reader adapter that hashes everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: ContentHasher,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R, algorithm: DigestAlgorithm) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(algorithm),
        }
    }

    pub fn finish(self) -> (Digest, u64) {
        self.hasher.finish()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Writer adapter that hashes everything written through it.
pub struct HashingWriter<W> {
    inner: W,
    hasher: ContentHasher,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W, algorithm: DigestAlgorithm) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(algorithm),
        }
    }

    /// Finish hashing and hand back the wrapped writer.
    pub fn finish(self) -> (W, Digest, u64) {
        let (digest, len) = self.hasher.finish();
        (self.inner, digest, len)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Drain a reader, returning its SHA-256 digest and length.
pub fn digest_reader<R: Read>(reader: R) -> io::Result<(Digest, u64)> {
    let mut hashing = HashingReader::new(reader, DigestAlgorithm::Sha256);
    io::copy(&mut hashing, &mut io::sink())?;
    Ok(hashing.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = ContentHasher::sha256();
        hasher.update(b"test");
        hasher.update(b"data");
        let (digest, len) = hasher.finish();
        assert_eq!(digest, Digest::from_bytes(b"testdata"));
        assert_eq!(len, 8);
    }

    #[test]
    fn empty_input() {
        let hasher = ContentHasher::sha256();
        assert!(hasher.is_empty());
        let (digest, len) = hasher.finish();
        assert_eq!(len, 0);
        assert_eq!(digest, Digest::from_bytes(b""));
    }

    #[test]
    fn reader_hashes_passthrough() {
        let mut reader = HashingReader::new(&b"testdata"[..], DigestAlgorithm::Sha256);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"testdata");
        let (digest, len) = reader.finish();
        assert_eq!(digest, Digest::from_bytes(b"testdata"));
        assert_eq!(len, 8);
    }

    #[test]
    fn writer_hashes_passthrough() {
        let mut writer = HashingWriter::new(Vec::new(), DigestAlgorithm::Sha512);
        writer.write_all(b"payload").unwrap();
        let (inner, digest, len) = writer.finish();
        assert_eq!(inner, b"payload");
        assert_eq!(len, 7);
        assert_eq!(digest, Digest::compute(DigestAlgorithm::Sha512, b"payload"));
    }

    #[test]
    fn digest_reader_drains() {
        let (digest, len) = digest_reader(&b"abc"[..]).unwrap();
        assert_eq!(len, 3);
        assert!(digest.verify(b"abc"));
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_digest(
            data in proptest::collection::vec(any::<u8>(), 0..1024),
            split in 0usize..1024,
        ) {
            let split = split.min(data.len());
            let mut hasher = ContentHasher::sha256();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            prop_assert_eq!(hasher.finish().0, Digest::from_bytes(&data));
        }
    }
}
