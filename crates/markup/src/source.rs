//! Lazy byte sources feeding the parsers.
//!
//! A source is pulled one chunk at a time; `Ok(None)` marks end of stream.
//! Sources are finite and not restartable; everything the encoding detector
//! needs to look at twice is buffered upstream by the input stage.

use std::collections::VecDeque;
use std::io::{self, Read};

/// A lazy, finite sequence of byte chunks.
pub trait ByteSource {
    /// Pull the next chunk. `Ok(None)` is end of stream and must be sticky.
    fn pull(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// In-memory source: yields the whole slice as a single chunk.
#[derive(Debug)]
pub struct SliceSource<'a> {
    data: Option<&'a [u8]>,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data: Some(data) }
    }
}

impl ByteSource for SliceSource<'_> {
    fn pull(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.data.take().map(<[u8]>::to_vec))
    }
}

/// Chunked in-memory source. Feeding a document in several chunks must
/// produce the same signal stream as feeding it whole.
impl ByteSource for VecDeque<Vec<u8>> {
    fn pull(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.pop_front())
    }
}

/// Adapter over any `std::io::Read`.
#[derive(Debug)]
pub struct ReadSource<R> {
    reader: R,
    chunk_len: usize,
}

impl<R: Read> ReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            chunk_len: 8 * 1024,
        }
    }

    pub fn with_chunk_len(reader: R, chunk_len: usize) -> Self {
        debug_assert!(chunk_len > 0, "chunk_len must be positive");
        Self { reader, chunk_len }
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn pull(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_len];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(buf));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteSource, ReadSource, SliceSource};
    use std::collections::VecDeque;

    #[test]
    fn slice_source_yields_once_then_ends() {
        let mut source = SliceSource::new(b"abc");
        assert_eq!(source.pull().unwrap(), Some(b"abc".to_vec()));
        assert_eq!(source.pull().unwrap(), None);
        assert_eq!(source.pull().unwrap(), None);
    }

    #[test]
    fn chunk_source_preserves_order() {
        let mut source: VecDeque<Vec<u8>> =
            VecDeque::from(vec![b"ab".to_vec(), b"".to_vec(), b"c".to_vec()]);
        assert_eq!(source.pull().unwrap(), Some(b"ab".to_vec()));
        assert_eq!(source.pull().unwrap(), Some(b"".to_vec()));
        assert_eq!(source.pull().unwrap(), Some(b"c".to_vec()));
        assert_eq!(source.pull().unwrap(), None);
    }

    #[test]
    fn read_source_respects_chunk_len() {
        let mut source = ReadSource::with_chunk_len(&b"abcdef"[..], 4);
        assert_eq!(source.pull().unwrap(), Some(b"abcd".to_vec()));
        assert_eq!(source.pull().unwrap(), Some(b"ef".to_vec()));
        assert_eq!(source.pull().unwrap(), None);
    }
}
