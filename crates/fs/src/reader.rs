use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Default alignment used by block-addressed readers when no other size is
/// given. Matches the page size redo-log segments are written in, so a
/// reader never hands out a chunk that splits a page.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Supplies a file's bytes to the copy path one chunk at a time.
///
/// Two shapes exist because the two engine variants read source files
/// differently: a plain or append-only file is read as a flat byte stream,
/// while a partitioned table leaf or redo log segment is read in
/// page-aligned blocks so the destination can apply chunks independently
/// of arrival order.
pub trait FileReader {
    /// Fills as much of `buf` as the next chunk provides, returning the
    /// number of bytes written. Returns `0` at end of file.
    fn next_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Byte offset in the source file the next call to `next_chunk` will
    /// start reading from.
    fn position(&self) -> u64;
}

/// Reads a file start to end with no alignment constraint.
pub struct SequentialReader {
    inner: BufReader<File>,
    position: u64,
}

impl SequentialReader {
    /// # Errors
    /// Propagates any `io::Error` opening `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self { inner: BufReader::new(File::open(path)?), position: 0 })
    }
}

impl FileReader for SequentialReader {
    fn next_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Reads a file in fixed-size, page-aligned blocks, seeking explicitly
/// rather than relying on sequential read position.
///
/// Used for partitioned table leaves and redo log segments, where the
/// source may still be appending past the reader's current position and
/// chunk boundaries must line up with the engine's own page size.
pub struct BlockAddressedReader {
    file: File,
    block_size: usize,
    position: u64,
    len: u64,
}

impl BlockAddressedReader {
    /// # Errors
    /// Propagates any `io::Error` opening or stat-ing `path`.
    pub fn open(path: &Path, block_size: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, block_size, position: 0, len })
    }

    /// Total file length observed when the reader was opened. A growing
    /// file may be longer by the time reading finishes; callers that need
    /// the freshest length should re-stat.
    #[must_use]
    pub fn known_len(&self) -> u64 {
        self.len
    }
}

impl FileReader for BlockAddressedReader {
    fn next_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.len {
            return Ok(0);
        }
        let want = self.block_size.min(buf.len());
        self.file.seek(SeekFrom::Start(self.position))?;
        let remaining = (self.len - self.position).min(want as u64) as usize;
        let n = self.file.read(&mut buf[..remaining])?;
        self.position += n as u64;
        Ok(n)
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sequential_reader_drains_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1.ibd");
        std::fs::write(&path, b"hello world").unwrap();

        let mut reader = SequentialReader::open(&path).unwrap();
        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = reader.next_chunk(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, b"hello world");
        assert_eq!(reader.position(), 11);
    }

    #[test]
    fn block_addressed_reader_respects_block_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aria_log.00000001");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![7u8; 20]).unwrap();
        drop(f);

        let mut reader = BlockAddressedReader::open(&path, 8).unwrap();
        let mut buf = [0u8; 32];
        let n1 = reader.next_chunk(&mut buf).unwrap();
        assert_eq!(n1, 8);
        let n2 = reader.next_chunk(&mut buf).unwrap();
        assert_eq!(n2, 8);
        let n3 = reader.next_chunk(&mut buf).unwrap();
        assert_eq!(n3, 4);
        let n4 = reader.next_chunk(&mut buf).unwrap();
        assert_eq!(n4, 0);
    }

    #[test]
    fn block_addressed_reader_reports_known_len() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1#P#p0.ibd");
        std::fs::write(&path, vec![1u8; 100]).unwrap();
        let reader = BlockAddressedReader::open(&path, DEFAULT_BLOCK_SIZE).unwrap();
        assert_eq!(reader.known_len(), 100);
    }
}
