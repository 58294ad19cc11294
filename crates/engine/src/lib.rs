//! Ties the wire, job-queue, and filesystem crates into the runnable
//! protocol: a [`CloneRegistry`] tracking active clones, a [`CloneHandle`]
//! per clone, and a [`StageDriver`] whose entry points mirror the
//! protocol's external calls.

mod apply;
mod driver;
mod handle;
mod registry;
mod sink;
mod tail;

pub use apply::FileApplier;
pub use driver::{Capability, StageDriver};
pub use handle::{CloneHandle, EngineVariant, Role};
pub use registry::{CloneRegistry, MAX_CLONE, MAX_TASKS};
pub use sink::SharedSink;
pub use tail::{copy_finish_tail, copy_partial_tail, LOG_HEADER_LEN};
