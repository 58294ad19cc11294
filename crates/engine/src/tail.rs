use std::fs::File;
use std::io::Read;
use std::path::Path;

use clone_fs::{BlockAddressedReader, ChunkSink, FileReader};
use clone_jobs::CloneError;
use clone_wire::{Descriptor, HeaderKind, Offset, FLAG_REDO_LOG};

/// Width of the fixed header a redo log segment carries at offset zero,
/// recording (among other things) the segment's flush LSN. Re-sent once
/// the tail has otherwise finished copying so the destination's footer
/// reflects the log's state at the moment the snapshot stage closed.
pub const LOG_HEADER_LEN: usize = 8;

/// Sends as much of a redo log segment's tail as is safely stable,
/// deliberately holding back the last (possibly still-being-written) page.
///
/// The source may still be appending to this file while the snapshot
/// stage is in progress, so only full pages up to the last complete one
/// are sent; [`copy_finish_tail`] picks up whatever was held back once the
/// source confirms no further writes are coming.
///
/// # Errors
/// Propagates I/O errors from `reader` and any error `sink` returns.
pub fn copy_partial_tail(
    reader: &mut BlockAddressedReader,
    wire_name: &str,
    block_size: usize,
    sink: &mut dyn ChunkSink,
) -> Result<u64, CloneError> {
    let len = reader.known_len();
    let aligned = (len / block_size as u64) * block_size as u64;
    let target = if aligned == len { aligned.saturating_sub(block_size as u64) } else { aligned };

    let mut first = true;
    while reader.position() < target {
        let mut buf = vec![0u8; block_size];
        let n = reader
            .next_chunk(&mut buf)
            .map_err(|e| CloneError::io(format!("reading tail of {wire_name}"), e))?;
        if n == 0 {
            break;
        }
        let name = if first { wire_name.to_string() } else { String::new() };
        sink.send(
            Descriptor {
                kind: HeaderKind::Transactional,
                offset: Offset::Append,
                flags: FLAG_REDO_LOG,
                name,
            },
            &buf[..n],
        )?;
        first = false;
    }
    Ok(reader.position())
}

/// Sends whatever remains of a redo log segment past the position
/// [`copy_partial_tail`] stopped at, then re-sends the segment's header so
/// the destination's copy of the flush LSN is current as of the snapshot.
///
/// # Errors
/// Propagates I/O errors reading `path` and any error `sink` returns.
pub fn copy_finish_tail(
    path: &Path,
    wire_name: &str,
    reader: &mut BlockAddressedReader,
    sink: &mut dyn ChunkSink,
) -> Result<(), CloneError> {
    let mut sent_any = false;
    loop {
        let mut buf = vec![0u8; 4096];
        let n = reader
            .next_chunk(&mut buf)
            .map_err(|e| CloneError::io(format!("reading tail of {wire_name}"), e))?;
        if n == 0 {
            break;
        }
        let name = if sent_any { String::new() } else { wire_name.to_string() };
        sink.send(
            Descriptor {
                kind: HeaderKind::Transactional,
                offset: Offset::Append,
                flags: FLAG_REDO_LOG,
                name,
            },
            &buf[..n],
        )?;
        sent_any = true;
    }

    let mut header = vec![0u8; LOG_HEADER_LEN];
    let mut file =
        File::open(path).map_err(|e| CloneError::io(format!("reopening {wire_name}"), e))?;
    file.read_exact(&mut header)
        .map_err(|e| CloneError::io(format!("reading header of {wire_name}"), e))?;
    sink.send(
        Descriptor {
            kind: HeaderKind::Transactional,
            offset: Offset::AtByte(0),
            flags: FLAG_REDO_LOG,
            name: wire_name.to_string(),
        },
        &header,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        chunks: Vec<(Descriptor, Vec<u8>)>,
    }

    impl ChunkSink for RecordingSink {
        fn send(&mut self, descriptor: Descriptor, payload: &[u8]) -> Result<(), CloneError> {
            self.chunks.push((descriptor, payload.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn partial_tail_holds_back_last_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aria_log.00000001");
        std::fs::write(&path, vec![1u8; 20]).unwrap();

        let mut reader = BlockAddressedReader::open(&path, 8).unwrap();
        let mut sink = RecordingSink { chunks: Vec::new() };
        let stopped_at =
            copy_partial_tail(&mut reader, "aria_log.00000001", 8, &mut sink).unwrap();

        assert_eq!(stopped_at, 16);
        let total: usize = sink.chunks.iter().map(|(_, p)| p.len()).sum();
        assert_eq!(total, 16);
    }

    #[test]
    fn finish_tail_sends_remainder_then_refreshes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aria_log.00000001");
        std::fs::write(&path, vec![2u8; 20]).unwrap();

        let mut reader = BlockAddressedReader::open(&path, 8).unwrap();
        let mut sink = RecordingSink { chunks: Vec::new() };
        copy_partial_tail(&mut reader, "aria_log.00000001", 8, &mut sink).unwrap();
        sink.chunks.clear();

        copy_finish_tail(&path, "aria_log.00000001", &mut reader, &mut sink).unwrap();

        let last = sink.chunks.last().unwrap();
        assert_eq!(last.0.offset, Offset::AtByte(0));
        assert_eq!(last.1.len(), LOG_HEADER_LEN);
    }
}
