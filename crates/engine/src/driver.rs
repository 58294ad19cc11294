use std::path::PathBuf;
use std::sync::Arc;

use clone_fs::{
    discover_tables, BlockAddressedReader, FileClass, FileReader, SequentialReader, Table,
};
use clone_jobs::{CloneError, Session, ThreadContext};
use clone_wire::{Descriptor, Locator, Offset, Stage};
use tracing::{info, instrument};

use crate::handle::{CloneHandle, EngineVariant, Role};
use crate::registry::CloneRegistry;
use crate::sink::SharedSink;
use crate::tail::{copy_finish_tail, copy_partial_tail, LOG_HEADER_LEN};

/// Maps a discovered table to the stage its files are safe to enqueue in.
///
/// Plain and partitioned tables move in the wide-open concurrent stage.
/// Append-only log tables wait until DDL is blocked, since their capture is
/// coordinated by that lock rather than BACKUP LOCK. Statistics tables are
/// cheap to recompute on the destination if copying fails, so they are left
/// until the final snapshot stage.
fn stage_for_table(table: &Table) -> Stage {
    match table {
        Table::Plain { .. } | Table::Partitioned { .. } => Stage::Concurrent,
        Table::AppendOnlyLog { .. } => Stage::DdlBlocked,
        Table::Statistics { .. } => Stage::Snapshot,
    }
}

/// Bits a host queries before starting a clone. This build always supports
/// blocking capture (BACKUP LOCK / DDL-lock coordination between stages)
/// and more than one worker task per clone.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct Capability {
    pub blocking: bool,
    pub multi_task: bool,
}

/// Entry points mirroring the protocol's external calls: `begin`/`copy`/
/// `ack`/`end` on the source, `apply_begin`/`apply`/`apply_end` on the
/// destination.
pub struct StageDriver;

impl StageDriver {
    /// The capability flags this build advertises, mirroring
    /// `clone_capability`: always blocking-capable and multi-task capable.
    #[must_use]
    pub fn capability() -> Capability {
        Capability { blocking: true, multi_task: true }
    }

    /// Starts a new copy-side clone: scans `data_dir`, allocates a
    /// locator, and registers the resulting handle.
    ///
    /// # Errors
    /// Returns [`CloneError::Capacity`] if a copy clone is already active,
    /// or [`CloneError::Io`] if `data_dir` cannot be scanned.
    #[instrument(skip(registry, sink))]
    pub fn begin_copy(
        registry: &CloneRegistry,
        variant: EngineVariant,
        data_dir: &std::path::Path,
        task_count: usize,
        chunk_size: usize,
        sink: SharedSink,
    ) -> Result<(Locator, Arc<CloneHandle>), CloneError> {
        let tables = discover_tables(data_dir)?;
        let clone_id = registry.allocate_clone_id()?;
        let locator = Locator::new(clone_id, 0);
        let handle = Arc::new(CloneHandle::new(
            locator,
            Role::Copy,
            variant,
            task_count,
            chunk_size,
            sink,
            tables,
            PathBuf::new(),
        ));
        registry.register_copy(handle.clone())?;
        info!(%locator, tables = handle.tables.lock().unwrap().len(), "copy clone started");
        Ok((locator, handle))
    }

    /// Starts a new apply-side clone under the locator the source already
    /// allocated.
    ///
    /// # Errors
    /// Returns [`CloneError::Capacity`] if an apply clone is already
    /// active for this process.
    pub fn begin_apply(
        registry: &CloneRegistry,
        locator: Locator,
        variant: EngineVariant,
        apply_dir: PathBuf,
    ) -> Result<Arc<CloneHandle>, CloneError> {
        let handle = Arc::new(CloneHandle::new(
            locator,
            Role::Apply,
            variant,
            1,
            0,
            SharedSink::new(NullSink),
            Vec::new(),
            apply_dir,
        ));
        registry.register_apply(handle.clone())?;
        Ok(handle)
    }

    /// Runs one host-supplied worker thread's share of a copy clone up
    /// through `stage`, re-entrant the way a real host calls it once per
    /// stage per task.
    ///
    /// Reads the clone's current cursor (the lowest stage not yet marked
    /// finished) and runs every stage from there through `stage` in order,
    /// so a host that jumps several stages in one call is tolerated the
    /// same way a host that calls once per stage is. A host is expected to
    /// call this once per task per stage, advancing the destination's own
    /// stage between calls so the two sides stay interleaved rather than
    /// one running to completion before the other starts.
    ///
    /// # Errors
    /// Returns the clone's sticky first error, if any job failed, or a
    /// lock/cancellation error from the job repository itself.
    pub fn copy(
        ctx: &ThreadContext,
        handle: &CloneHandle,
        stage: Stage,
        session: &dyn Session,
    ) -> Result<(), CloneError> {
        loop {
            let Some(cursor) = handle.repository.last_finished_stage()? else { break };
            if cursor > stage {
                break;
            }
            Self::clone_low(ctx, handle, cursor, session)?;
        }
        Ok(())
    }

    /// Runs exactly one stage: task 0 scans and enqueues that stage's
    /// jobs, then every task (task 0 included) drains the queue until the
    /// stage is finished and empty.
    fn clone_low(
        ctx: &ThreadContext,
        handle: &CloneHandle,
        stage: Stage,
        session: &dyn Session,
    ) -> Result<(), CloneError> {
        let mut scan_err = None;
        if ctx.task_index == 0 {
            handle.set_current_stage(stage);
            scan_err = Self::scan_and_enqueue(handle, stage, session).err();
            handle.repository.finish(stage, scan_err.clone())?;
        }
        let err = handle.repository.consume(ctx, stage, scan_err, session)?;
        if let Some(e) = err {
            return Err(e);
        }
        Ok(())
    }

    /// Enqueues every job a single stage is responsible for starting.
    /// Called only by task 0.
    fn scan_and_enqueue(
        handle: &CloneHandle,
        stage: Stage,
        session: &dyn Session,
    ) -> Result<(), CloneError> {
        let tables = handle.tables.lock().map_err(|_| CloneError::lock_failed("table list"))?.clone();

        match stage {
            Stage::Concurrent | Stage::DdlBlocked => {
                for table in tables.iter().filter(|t| stage_for_table(t) == stage) {
                    for (wire_name, path) in table.files() {
                        if matches!(table, Table::AppendOnlyLog { .. })
                            && FileClass::classify(&wire_name) == FileClass::RewriteableMeta
                        {
                            // Can be rewritten mid-stream by its owning
                            // table; deferred to the snapshot finalize pass.
                            continue;
                        }
                        Self::enqueue_file_copy(handle, wire_name, path)?;
                    }
                }
            }
            Stage::NtDmlBlocked => {}
            Stage::Snapshot => {
                for table in tables.iter().filter(|t| stage_for_table(t) == Stage::Snapshot) {
                    for (wire_name, path) in table.files() {
                        Self::enqueue_file_copy(handle, wire_name, path)?;
                    }
                }
                for table in tables.iter().filter(|t| matches!(t, Table::AppendOnlyLog { .. })) {
                    for (wire_name, path) in table.files() {
                        if FileClass::classify(&wire_name) == FileClass::RewriteableMeta {
                            Self::enqueue_file_copy(handle, wire_name, path)?;
                        }
                    }
                }
                if handle.variant == EngineVariant::Transactional {
                    handle.repository.wait_pending(session)?;
                    for table in tables.iter() {
                        for (wire_name, path) in table.files() {
                            if FileClass::classify(&wire_name) == FileClass::RedoLog {
                                Self::enqueue_redo_tail(handle, wire_name, path)?;
                            }
                        }
                    }
                }
            }
            Stage::End => {}
        }
        Ok(())
    }

    fn enqueue_file_copy(
        handle: &CloneHandle,
        wire_name: String,
        path: PathBuf,
    ) -> Result<(), CloneError> {
        let sink = handle.sink.clone();
        let kind = handle.variant.header_kind();
        let chunk_size = handle.chunk_size;
        let block_addressed = FileClass::classify(&wire_name).is_block_addressed();

        handle.repository.enqueue(Box::new(move |_ctx, in_err| {
            if let Some(e) = in_err {
                return Err(e.clone());
            }
            let mut sink = sink;
            let mut reader: Box<dyn FileReader> = if block_addressed {
                Box::new(
                    BlockAddressedReader::open(&path, clone_fs::DEFAULT_BLOCK_SIZE)
                        .map_err(|e| CloneError::io(format!("opening {wire_name}"), e))?,
                )
            } else {
                Box::new(
                    SequentialReader::open(&path)
                        .map_err(|e| CloneError::io(format!("opening {wire_name}"), e))?,
                )
            };
            clone_fs::send_file(kind, &wire_name, 0, chunk_size, reader.as_mut(), &mut sink)
        }))
    }

    fn enqueue_redo_tail(
        handle: &CloneHandle,
        wire_name: String,
        path: PathBuf,
    ) -> Result<(), CloneError> {
        let sink = handle.sink.clone();
        let block_size = clone_fs::DEFAULT_BLOCK_SIZE;

        handle.repository.enqueue(Box::new(move |_ctx, in_err| {
            if let Some(e) = in_err {
                return Err(e.clone());
            }
            let mut sink = sink;
            let mut reader = BlockAddressedReader::open(&path, block_size)
                .map_err(|e| CloneError::io(format!("opening {wire_name}"), e))?;
            copy_partial_tail(&mut reader, &wire_name, block_size, &mut sink)?;
            copy_finish_tail(&path, &wire_name, &mut reader, &mut sink)
        }))
    }

    /// Applies one incoming descriptor+payload pair on the destination
    /// side.
    ///
    /// # Errors
    /// Returns [`CloneError::InvalidInput`] if the handle is not an apply
    /// handle, or any I/O error from [`crate::apply::FileApplier`].
    pub fn apply_chunk(handle: &CloneHandle, descriptor: &Descriptor, payload: &[u8]) -> Result<(), CloneError> {
        if handle.role != Role::Apply {
            return Err(CloneError::invalid_input("apply_chunk called on a non-apply handle"));
        }
        let mut applier =
            handle.applier.lock().map_err(|_| CloneError::lock_failed("file applier"))?;
        applier.apply(descriptor, payload)
    }

    /// Marks `stage` complete on the apply side, mirroring the source's
    /// own stage progression. The destination never drains a job queue of
    /// its own; it advances purely by what the source tells it.
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] on a poisoned repository mutex.
    pub fn apply_advance_stage(handle: &CloneHandle, stage: Stage) -> Result<(), CloneError> {
        handle.set_current_stage(stage);
        handle.repository.finish(stage, None)
    }

    /// Re-reads the redo log header a descriptor targeted with
    /// [`Offset::AtByte`] `0`, verifying it is exactly [`LOG_HEADER_LEN`]
    /// bytes before the caller relies on it being a whole footer.
    #[must_use]
    pub fn is_log_header_refresh(descriptor: &Descriptor, payload: &[u8]) -> bool {
        matches!(descriptor.offset, Offset::AtByte(0)) && payload.len() == LOG_HEADER_LEN
    }
}

struct NullSink;

impl clone_fs::ChunkSink for NullSink {
    fn send(&mut self, _descriptor: Descriptor, _payload: &[u8]) -> Result<(), CloneError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SharedSink;
    use clone_jobs::NeverKilled;
    use std::sync::Mutex;

    struct RecordingSink {
        chunks: Arc<Mutex<Vec<(Descriptor, Vec<u8>)>>>,
    }

    impl clone_fs::ChunkSink for RecordingSink {
        fn send(&mut self, descriptor: Descriptor, payload: &[u8]) -> Result<(), CloneError> {
            self.chunks.lock().unwrap().push((descriptor, payload.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn single_threaded_copy_drives_every_stage_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shop")).unwrap();
        std::fs::write(dir.path().join("shop/t1.ibd"), vec![1u8; 5]).unwrap();
        std::fs::write(dir.path().join("shop/t1.MYD"), vec![2u8; 5]).unwrap();

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink::new(RecordingSink { chunks: chunks.clone() });
        let registry = CloneRegistry::new();
        let (_locator, handle) = StageDriver::begin_copy(
            &registry,
            EngineVariant::Common,
            dir.path(),
            1,
            4096,
            sink,
        )
        .unwrap();

        let ctx = ThreadContext::new(0);
        StageDriver::copy(&ctx, &handle, Stage::End, &NeverKilled).unwrap();

        assert_eq!(handle.repository.last_finished_stage().unwrap(), None);
        assert!(!chunks.lock().unwrap().is_empty());
    }

    #[test]
    fn copy_is_re_entrant_one_stage_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shop")).unwrap();
        std::fs::write(dir.path().join("shop/t1.ibd"), vec![1u8; 5]).unwrap();

        let sink = SharedSink::new(RecordingSink { chunks: Arc::new(Mutex::new(Vec::new())) });
        let registry = CloneRegistry::new();
        let (_locator, handle) =
            StageDriver::begin_copy(&registry, EngineVariant::Common, dir.path(), 1, 4096, sink)
                .unwrap();

        let ctx = ThreadContext::new(0);
        StageDriver::copy(&ctx, &handle, Stage::Concurrent, &NeverKilled).unwrap();
        assert_eq!(handle.repository.last_finished_stage().unwrap(), Some(Stage::NtDmlBlocked));

        StageDriver::copy(&ctx, &handle, Stage::NtDmlBlocked, &NeverKilled).unwrap();
        assert_eq!(handle.repository.last_finished_stage().unwrap(), Some(Stage::DdlBlocked));

        StageDriver::copy(&ctx, &handle, Stage::End, &NeverKilled).unwrap();
        assert_eq!(handle.repository.last_finished_stage().unwrap(), None);
    }

    #[test]
    fn log_table_rewriteable_marker_waits_for_finalize() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shop")).unwrap();
        std::fs::write(dir.path().join("shop/log.CSV"), vec![1u8; 200]).unwrap();
        std::fs::write(dir.path().join("shop/log.CSM"), vec![2u8; 10]).unwrap();

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink::new(RecordingSink { chunks: chunks.clone() });
        let registry = CloneRegistry::new();
        let (_locator, handle) = StageDriver::begin_copy(
            &registry,
            EngineVariant::Common,
            dir.path(),
            1,
            4096,
            sink,
        )
        .unwrap();

        let ctx = ThreadContext::new(0);
        StageDriver::copy(&ctx, &handle, Stage::DdlBlocked, &NeverKilled).unwrap();
        let names_before: Vec<String> =
            chunks.lock().unwrap().iter().filter_map(|(d, _)| (!d.name.is_empty()).then(|| d.name.clone())).collect();
        assert!(names_before.iter().any(|n| n.ends_with("log.CSV")));
        assert!(!names_before.iter().any(|n| n.ends_with("log.CSM")));

        StageDriver::copy(&ctx, &handle, Stage::Snapshot, &NeverKilled).unwrap();
        let names_after: Vec<String> =
            chunks.lock().unwrap().iter().filter_map(|(d, _)| (!d.name.is_empty()).then(|| d.name.clone())).collect();
        assert!(names_after.iter().any(|n| n.ends_with("log.CSM")));
    }

    #[test]
    fn apply_chunk_rejects_copy_handles() {
        let handle = CloneHandle::new(
            Locator::new(1, 0),
            Role::Copy,
            EngineVariant::Common,
            1,
            4096,
            SharedSink::new(NullSink),
            Vec::new(),
            PathBuf::new(),
        );
        let descriptor = Descriptor {
            kind: clone_wire::HeaderKind::Common,
            offset: Offset::NoData,
            flags: 0,
            name: "x".into(),
        };
        let err = StageDriver::apply_chunk(&handle, &descriptor, &[]).unwrap_err();
        assert!(matches!(err, CloneError::InvalidInput(_)));
    }

    #[test]
    fn capability_advertises_blocking_and_multi_task() {
        let cap = StageDriver::capability();
        assert!(cap.blocking);
        assert!(cap.multi_task);
    }
}
