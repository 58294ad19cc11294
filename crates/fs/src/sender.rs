use clone_jobs::CloneError;
use clone_wire::{Descriptor, HeaderKind, Offset};

use crate::reader::FileReader;

/// Destination for descriptor+payload pairs produced while sending a file.
///
/// The engine crate supplies the real implementation (handing chunks to
/// the transport callback the host registered); tests and the CLI use an
/// in-memory implementation instead.
pub trait ChunkSink {
    /// # Errors
    /// Implementations surface transport or I/O failures as `CloneError`.
    fn send(&mut self, descriptor: Descriptor, payload: &[u8]) -> Result<(), CloneError>;
}

/// Drains `reader` and hands its bytes to `sink` as a sequence of
/// descriptor-tagged chunks.
///
/// Only the first chunk carries `wire_name`; every later chunk of the same
/// file reuses an empty name, telling the destination to keep appending to
/// the file it just opened. An empty source file produces exactly one
/// [`Offset::NoData`] descriptor and no payload, which tells the
/// destination to create (or truncate) the file without writing anything.
///
/// # Errors
/// Propagates I/O errors from `reader` and any error `sink` returns.
pub fn send_file(
    kind: HeaderKind,
    wire_name: &str,
    flags: u32,
    chunk_size: usize,
    reader: &mut dyn FileReader,
    sink: &mut dyn ChunkSink,
) -> Result<(), CloneError> {
    let mut buf = vec![0u8; chunk_size];
    let mut first = true;

    loop {
        let n = reader
            .next_chunk(&mut buf)
            .map_err(|e| CloneError::io(format!("reading {wire_name}"), e))?;

        if n == 0 {
            if first {
                let descriptor = Descriptor {
                    kind,
                    offset: Offset::NoData,
                    flags,
                    name: wire_name.to_string(),
                };
                sink.send(descriptor, &[])?;
            }
            return Ok(());
        }

        let name = if first { wire_name.to_string() } else { String::new() };
        let descriptor = Descriptor { kind, offset: Offset::Append, flags, name };
        sink.send(descriptor, &buf[..n])?;
        first = false;
    }
}
