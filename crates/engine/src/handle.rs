use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clone_fs::Table;
use clone_jobs::JobRepository;
use clone_wire::{HeaderKind, Locator, Stage};

use crate::apply::FileApplier;
use crate::sink::SharedSink;

/// Which side of the clone a handle represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// The source server, reading tables and streaming chunks out.
    Copy,
    /// The destination server, receiving chunks and writing files.
    Apply,
}

/// Which wire shape (and therefore which copy strategy) this clone uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineVariant {
    /// MyISAM-style: sequential per-file copy, no redo log tail.
    Common,
    /// Log-structured: partitioned tables and a streamed redo log tail.
    Transactional,
}

impl EngineVariant {
    #[must_use]
    pub fn header_kind(self) -> HeaderKind {
        match self {
            EngineVariant::Common => HeaderKind::Common,
            EngineVariant::Transactional => HeaderKind::Transactional,
        }
    }
}

/// Live state for one in-progress clone, shared by every worker thread
/// participating in it.
///
/// One handle exists per locator. The copy side's handle owns the table
/// list discovered at `begin` time; the apply side's handle owns nothing
/// but the repository and current stage, since it only reacts to chunks
/// as they arrive.
pub struct CloneHandle {
    pub locator: Locator,
    pub role: Role,
    pub variant: EngineVariant,
    pub repository: Arc<JobRepository>,
    pub task_count: usize,
    pub chunk_size: usize,
    pub sink: SharedSink,
    pub tables: Mutex<Vec<Table>>,
    /// Populated for [`Role::Apply`] handles; writes incoming chunks under
    /// the destination data directory.
    pub applier: Mutex<FileApplier>,
    current_stage: Mutex<Stage>,
}

impl CloneHandle {
    #[must_use]
    pub fn new(
        locator: Locator,
        role: Role,
        variant: EngineVariant,
        task_count: usize,
        chunk_size: usize,
        sink: SharedSink,
        tables: Vec<Table>,
        apply_dir: PathBuf,
    ) -> Self {
        Self {
            locator,
            role,
            variant,
            repository: Arc::new(JobRepository::new()),
            task_count,
            chunk_size,
            sink,
            tables: Mutex::new(tables),
            applier: Mutex::new(FileApplier::new(apply_dir)),
            current_stage: Mutex::new(Stage::Concurrent),
        }
    }

    #[must_use]
    pub fn current_stage(&self) -> Stage {
        *self.current_stage.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_current_stage(&self, stage: Stage) {
        let mut guard =
            self.current_stage.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = stage;
    }
}
