use std::fmt;

/// The five ordered phases a clone operation passes through.
///
/// Stages only ever move forward; a [`StageDriver`](crate) advances to the
/// next stage once every task has finished the current one. `End` is
/// terminal and carries no file transfer of its own — it signals the
/// destination to finalize.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Normal DML/DDL still allowed on the source; most table data moves
    /// here.
    Concurrent = 0,
    /// Non-transactional DML blocked; lets append-only and statistics
    /// files settle before the snapshot.
    NtDmlBlocked = 1,
    /// DDL blocked; schema files are stable for the remainder of the
    /// clone.
    DdlBlocked = 2,
    /// A consistent point-in-time snapshot; transactional engines stream
    /// their redo tail here.
    Snapshot = 3,
    /// Terminal marker. No further stage follows.
    End = 4,
}

/// Total count of stages that move data; [`Stage::End`] is not counted
/// since it transfers nothing.
pub const STAGE_COUNT: usize = 4;

/// All stages in forward order, [`Stage::Concurrent`] through
/// [`Stage::End`].
pub const ALL_STAGES: [Stage; 5] = [
    Stage::Concurrent,
    Stage::NtDmlBlocked,
    Stage::DdlBlocked,
    Stage::Snapshot,
    Stage::End,
];

impl Stage {
    /// Index into per-stage arrays (`0..=4`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as u8 as usize
    }

    /// The stage that follows this one, or `None` after [`Stage::End`].
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Stage::Concurrent => Some(Stage::NtDmlBlocked),
            Stage::NtDmlBlocked => Some(Stage::DdlBlocked),
            Stage::DdlBlocked => Some(Stage::Snapshot),
            Stage::Snapshot => Some(Stage::End),
            Stage::End => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::End)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Concurrent => "concurrent",
            Stage::NtDmlBlocked => "nt_dml_blocked",
            Stage::DdlBlocked => "ddl_blocked",
            Stage::Snapshot => "snapshot",
            Stage::End => "end",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut s = Stage::Concurrent;
        let mut seen = vec![s];
        while let Some(next) = s.next() {
            s = next;
            seen.push(s);
        }
        assert_eq!(seen, ALL_STAGES.to_vec());
    }

    #[test]
    fn end_is_terminal() {
        assert!(Stage::End.next().is_none());
        assert!(Stage::End.is_terminal());
        assert!(!Stage::Concurrent.is_terminal());
    }

    #[test]
    fn ordering_matches_protocol_progression() {
        assert!(Stage::Concurrent < Stage::NtDmlBlocked);
        assert!(Stage::Snapshot < Stage::End);
    }
}
