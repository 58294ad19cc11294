use std::sync::{Arc, Mutex};

use clone_fs::ChunkSink;
use clone_jobs::CloneError;
use clone_wire::Descriptor;

/// Makes a [`ChunkSink`] shareable across the worker threads copying a
/// clone's tables in parallel.
///
/// The transport a real host plugs in (a network connection, a pipe to
/// the destination process) is typically not `Sync`, and chunk ordering
/// within one file only matters relative to itself, so jobs serialize on
/// this lock rather than needing a lock-free transport.
#[derive(Clone)]
pub struct SharedSink(Arc<Mutex<dyn ChunkSink + Send>>);

impl SharedSink {
    #[must_use]
    pub fn new(sink: impl ChunkSink + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }
}

impl ChunkSink for SharedSink {
    fn send(&mut self, descriptor: Descriptor, payload: &[u8]) -> Result<(), CloneError> {
        let mut guard =
            self.0.lock().map_err(|_| CloneError::lock_failed("shared chunk sink"))?;
        guard.send(descriptor, payload)
    }
}
