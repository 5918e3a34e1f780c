use std::collections::VecDeque;
use std::collections::vec_deque;
use std::io::{self, IoSlice};

use bytes::{Buf, Bytes, BytesMut};

/// Ordered sequence of owned byte chunks.
///
/// Headers are usually known only after the payload below them has been
/// framed (length fields), so each layer prepends a fresh chunk instead of
/// copying the whole payload into a bigger allocation.
///
/// Invariants:
/// - `total_size` always equals the sum of the chunk lengths.
/// - No stored chunk is empty.
#[derive(Debug, Clone, Default)]
pub struct ChunkedBuffer {
    chunks: VecDeque<BytesMut>,
    total_size: usize,
}

impl ChunkedBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding one zeroed chunk of `size` bytes.
    ///
    /// Fill it through [`ChunkedBuffer::first_mut`].
    pub fn with_size(size: usize) -> Self {
        let mut buf = Self::new();
        buf.append(size);
        buf
    }

    /// Mutable view of the leading chunk, if any.
    pub fn first_mut(&mut self) -> Option<&mut [u8]> {
        self.chunks.front_mut().map(|chunk| &mut chunk[..])
    }

    /// Allocate a zeroed trailing chunk of `size` bytes and return it for filling.
    pub fn append(&mut self, size: usize) -> &mut [u8] {
        if size == 0 {
            return Default::default();
        }
        self.total_size += size;
        self.chunks.push_back(BytesMut::zeroed(size));
        match self.chunks.back_mut() {
            Some(chunk) => &mut chunk[..],
            None => unreachable!("chunk was just pushed"),
        }
    }

    /// Allocate a zeroed leading chunk of `size` bytes and return it for filling.
    pub fn prepend(&mut self, size: usize) -> &mut [u8] {
        if size == 0 {
            return Default::default();
        }
        self.total_size += size;
        self.chunks.push_front(BytesMut::zeroed(size));
        match self.chunks.front_mut() {
            Some(chunk) => &mut chunk[..],
            None => unreachable!("chunk was just pushed"),
        }
    }

    /// Append a copy of `data` as a new trailing chunk.
    pub fn append_slice(&mut self, data: &[u8]) {
        self.append(data.len()).copy_from_slice(data);
    }

    /// Prepend a copy of `data` as a new leading chunk.
    pub fn prepend_slice(&mut self, data: &[u8]) {
        self.prepend(data.len()).copy_from_slice(data);
    }

    /// Total number of bytes across all chunks.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// Number of chunks currently held.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Iterate the chunks in emission order.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            inner: self.chunks.iter(),
        }
    }

    /// Remove the first `n` bytes and return them as a new buffer.
    ///
    /// A chunk straddling the cut is split in two: its head ends the prefix
    /// and its tail becomes the new leading chunk of `self`.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`ChunkedBuffer::total_size`].
    pub fn split_prefix(&mut self, n: usize) -> ChunkedBuffer {
        assert!(
            n <= self.total_size,
            "split_prefix out of bounds: n={n}, total_size={}",
            self.total_size
        );

        let mut prefix = ChunkedBuffer::new();
        while prefix.total_size < n {
            let Some(mut chunk) = self.chunks.pop_front() else {
                break;
            };
            let wanted = n - prefix.total_size;
            if chunk.len() > wanted {
                let head = chunk.split_to(wanted);
                self.chunks.push_front(chunk);
                prefix.push_chunk(head);
            } else {
                prefix.push_chunk(chunk);
            }
        }
        self.total_size -= n;
        prefix
    }

    /// Write every chunk, in order, to `out`. The buffer is left untouched.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for chunk in self.chunks() {
            out.write_all(chunk)?;
        }
        Ok(())
    }

    /// Copy all chunks into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size);
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Collapse the buffer into contiguous, immutable bytes.
    pub fn freeze(mut self) -> Bytes {
        if self.chunks.len() == 1 {
            if let Some(chunk) = self.chunks.pop_front() {
                return chunk.freeze();
            }
        }
        Bytes::from(self.to_vec())
    }

    fn push_chunk(&mut self, chunk: BytesMut) {
        if chunk.is_empty() {
            return;
        }
        self.total_size += chunk.len();
        self.chunks.push_back(chunk);
    }
}

impl From<&[u8]> for ChunkedBuffer {
    fn from(data: &[u8]) -> Self {
        let mut buf = Self::new();
        buf.append_slice(data);
        buf
    }
}

impl From<Vec<u8>> for ChunkedBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from(BytesMut::from(&data[..]))
    }
}

impl From<BytesMut> for ChunkedBuffer {
    fn from(data: BytesMut) -> Self {
        let mut buf = Self::new();
        buf.push_chunk(data);
        buf
    }
}

impl From<Bytes> for ChunkedBuffer {
    fn from(data: Bytes) -> Self {
        Self::from(BytesMut::from(&data[..]))
    }
}

/// Iterator over the chunks of a [`ChunkedBuffer`].
pub struct Chunks<'a> {
    inner: vec_deque::Iter<'a, BytesMut>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|chunk| &chunk[..])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Consuming reads drain chunks from the front, so a packet can be handed to
/// vectored async writers (`write_all_buf`) without flattening it first.
impl Buf for ChunkedBuffer {
    fn remaining(&self) -> usize {
        self.total_size
    }

    fn chunk(&self) -> &[u8] {
        self.chunks.front().map(|chunk| &chunk[..]).unwrap_or(&[])
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(
            cnt <= self.total_size,
            "cannot advance past the end: cnt={cnt}, remaining={}",
            self.total_size
        );
        self.total_size -= cnt;
        while cnt > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= cnt {
                cnt -= front.len();
                self.chunks.pop_front();
            } else {
                front.advance(cnt);
                cnt = 0;
            }
        }
    }

    fn chunks_vectored<'a>(&'a self, dst: &mut [IoSlice<'a>]) -> usize {
        let mut filled = 0;
        for (slot, chunk) in dst.iter_mut().zip(self.chunks.iter()) {
            *slot = IoSlice::new(chunk);
            filled += 1;
        }
        filled
    }
}
