//! Thread-safe job queue and error taxonomy shared by every stage of a
//! clone: workers supplied by the host drain [`JobRepository`] and report
//! back through the same sticky-first-error slot.

mod error;
mod repository;

pub use error::{CloneError, CloneResult};
pub use repository::{Job, JobRepository, NeverKilled, Session, ThreadContext};
