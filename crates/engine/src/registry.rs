use std::sync::{Arc, Mutex};

use clone_jobs::CloneError;
use clone_wire::Locator;

use crate::handle::CloneHandle;

/// Only one clone may be in flight at a time; a second `begin` while one is
/// active fails with [`CloneError::Capacity`] rather than queuing.
pub const MAX_CLONE: usize = 1;

/// Upper bound on worker threads a single clone may register.
pub const MAX_TASKS: usize = 128;

struct Slot {
    locator: Locator,
    handle: Arc<CloneHandle>,
}

/// Process-wide table of active clones, keyed by locator.
///
/// Copy-side and apply-side handles are tracked in separate slot tables
/// since the same process can simultaneously run a copy (as a source for
/// one peer) and an apply (as a destination for another).
#[derive(Default)]
pub struct CloneRegistry {
    copy_slots: Mutex<Vec<Slot>>,
    apply_slots: Mutex<Vec<Slot>>,
    next_clone_id: Mutex<u32>,
}

impl CloneRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            copy_slots: Mutex::new(Vec::new()),
            apply_slots: Mutex::new(Vec::new()),
            next_clone_id: Mutex::new(1),
        }
    }

    /// Allocates the next `clone_id`, unique for the life of this
    /// registry.
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] if the counter mutex is
    /// poisoned.
    pub fn allocate_clone_id(&self) -> Result<u32, CloneError> {
        let mut guard =
            self.next_clone_id.lock().map_err(|_| CloneError::lock_failed("clone id counter"))?;
        let id = *guard;
        *guard += 1;
        Ok(id)
    }

    /// Registers a newly created copy-side handle under its locator.
    ///
    /// # Errors
    /// Returns [`CloneError::Capacity`] if [`MAX_CLONE`] copy clones are
    /// already active, or [`CloneError::LockFailed`] on a poisoned mutex.
    pub fn register_copy(&self, handle: Arc<CloneHandle>) -> Result<(), CloneError> {
        let mut guard =
            self.copy_slots.lock().map_err(|_| CloneError::lock_failed("copy slot table"))?;
        if guard.len() >= MAX_CLONE {
            return Err(CloneError::capacity("maximum concurrent copy clones reached"));
        }
        guard.push(Slot { locator: handle.locator, handle });
        Ok(())
    }

    /// Registers a newly created apply-side handle under its locator.
    ///
    /// # Errors
    /// Returns [`CloneError::Capacity`] if [`MAX_CLONE`] apply clones are
    /// already active, or [`CloneError::LockFailed`] on a poisoned mutex.
    pub fn register_apply(&self, handle: Arc<CloneHandle>) -> Result<(), CloneError> {
        let mut guard =
            self.apply_slots.lock().map_err(|_| CloneError::lock_failed("apply slot table"))?;
        if guard.len() >= MAX_CLONE {
            return Err(CloneError::capacity("maximum concurrent apply clones reached"));
        }
        guard.push(Slot { locator: handle.locator, handle });
        Ok(())
    }

    /// # Errors
    /// Returns [`CloneError::InvalidInput`] if no copy clone is registered
    /// under `locator`.
    pub fn lookup_copy(&self, locator: Locator) -> Result<Arc<CloneHandle>, CloneError> {
        let guard =
            self.copy_slots.lock().map_err(|_| CloneError::lock_failed("copy slot table"))?;
        guard
            .iter()
            .find(|s| s.locator == locator)
            .map(|s| s.handle.clone())
            .ok_or_else(|| CloneError::invalid_input(format!("no active copy clone for {locator}")))
    }

    /// # Errors
    /// Returns [`CloneError::InvalidInput`] if no apply clone is
    /// registered under `locator`.
    pub fn lookup_apply(&self, locator: Locator) -> Result<Arc<CloneHandle>, CloneError> {
        let guard =
            self.apply_slots.lock().map_err(|_| CloneError::lock_failed("apply slot table"))?;
        guard
            .iter()
            .find(|s| s.locator == locator)
            .map(|s| s.handle.clone())
            .ok_or_else(|| {
                CloneError::invalid_input(format!("no active apply clone for {locator}"))
            })
    }

    /// # Errors
    /// Returns [`CloneError::LockFailed`] on a poisoned mutex.
    pub fn drop_copy(&self, locator: Locator) -> Result<(), CloneError> {
        let mut guard =
            self.copy_slots.lock().map_err(|_| CloneError::lock_failed("copy slot table"))?;
        guard.retain(|s| s.locator != locator);
        Ok(())
    }

    /// # Errors
    /// Returns [`CloneError::LockFailed`] on a poisoned mutex.
    pub fn drop_apply(&self, locator: Locator) -> Result<(), CloneError> {
        let mut guard =
            self.apply_slots.lock().map_err(|_| CloneError::lock_failed("apply slot table"))?;
        guard.retain(|s| s.locator != locator);
        Ok(())
    }
}
