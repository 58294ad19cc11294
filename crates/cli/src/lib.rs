//! In-process harness wiring a copy-side [`CloneHandle`] directly to an
//! apply-side one, standing in for the network transport a real deployment
//! would use between two servers.

use std::path::PathBuf;
use std::sync::Arc;

use clone_engine::{CloneHandle, CloneRegistry, EngineVariant, FileApplier, Role, SharedSink, StageDriver};
use clone_fs::ChunkSink;
use clone_jobs::{CloneError, NeverKilled, ThreadContext};
use clone_wire::{Descriptor, Locator, ALL_STAGES};
use tracing::info;

/// Forwards every chunk produced by the copy side straight into the apply
/// side's [`FileApplier`], as if the two were connected by a wire.
pub struct TransportSink {
    apply_handle: Arc<CloneHandle>,
}

impl TransportSink {
    #[must_use]
    pub fn new(apply_handle: Arc<CloneHandle>) -> Self {
        Self { apply_handle }
    }
}

impl ChunkSink for TransportSink {
    fn send(&mut self, descriptor: Descriptor, payload: &[u8]) -> Result<(), CloneError> {
        StageDriver::apply_chunk(&self.apply_handle, &descriptor, payload)
    }
}

/// Result of one end-to-end run, reported back to the CLI for display.
#[derive(Debug)]
pub struct RunReport {
    pub locator: Locator,
    pub tables_discovered: usize,
}

/// Drives one full copy from `source_dir` into `dest_dir` using
/// `task_count` host-spawned worker threads, then settles the apply side
/// through every stage.
///
/// # Errors
/// Returns the clone's sticky first error, or any registry/apply failure.
pub fn run_clone(
    source_dir: &std::path::Path,
    dest_dir: &std::path::Path,
    variant: EngineVariant,
    task_count: usize,
    chunk_size: usize,
) -> Result<RunReport, CloneError> {
    let registry = CloneRegistry::new();

    let clone_id = registry.allocate_clone_id()?;
    let locator = Locator::new(clone_id, 0);

    let apply_handle =
        StageDriver::begin_apply(&registry, locator, variant, dest_dir.to_path_buf())?;
    let sink = SharedSink::new(TransportSink::new(apply_handle.clone()));

    let tables = clone_fs::discover_tables(source_dir)?;
    let tables_discovered = tables.len();
    let copy_handle = Arc::new(CloneHandle::new(
        locator,
        Role::Copy,
        variant,
        task_count.max(1),
        chunk_size,
        sink,
        tables,
        PathBuf::new(),
    ));
    registry.register_copy(copy_handle.clone())?;
    info!(%locator, tables_discovered, "starting clone");

    // One round of spawn/join per stage, with the apply side advanced in
    // between, so the two sides interleave the way two separate hosts
    // calling back and forth would rather than the copy side running to
    // completion before the apply side sees a single stage boundary.
    for stage in ALL_STAGES {
        let mut join_handles = Vec::with_capacity(task_count.max(1));
        for task_index in 0..task_count.max(1) {
            let copy_handle = copy_handle.clone();
            join_handles.push(std::thread::spawn(move || {
                let ctx = ThreadContext::new(task_index);
                StageDriver::copy(&ctx, &copy_handle, stage, &NeverKilled)
            }));
        }

        let mut first_error = None;
        for jh in join_handles {
            if let Err(e) = jh.join().expect("worker thread panicked") {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            registry.drop_copy(locator)?;
            registry.drop_apply(locator)?;
            return Err(e);
        }

        StageDriver::apply_advance_stage(&apply_handle, stage)?;
    }

    registry.drop_copy(locator)?;
    registry.drop_apply(locator)?;

    Ok(RunReport { locator, tables_discovered })
}

/// Convenience used by tests and the CLI's `--dest` path: builds a bare
/// apply handle with no registry, for exercising [`FileApplier`] alone.
#[must_use]
pub fn standalone_applier(dest_dir: PathBuf) -> FileApplier {
    FileApplier::new(dest_dir)
}
