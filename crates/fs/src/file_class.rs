use std::fmt;

/// How a data file must be copied, derived from its name and location.
///
/// The copy path treats each class differently: plain files are read
/// sequentially once, append-only logs may still be growing while they are
/// read, partitioned tables fan out into one `Table` per partition, and
/// redo log files are handled outside the normal per-table job stream
/// entirely (see the snapshot-stage tail streaming in `clone-engine`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FileClass {
    /// An ordinary data or index file, stable once written.
    Plain,
    /// Grows by appending; readers must tolerate the file being longer at
    /// close than it was at open.
    AppendOnlyLog,
    /// Engine-maintained statistics, safe to recompute on the destination
    /// if copying fails; still copied opportunistically.
    Statistics,
    /// One leaf of a partitioned table, named with a `#P#` (or `#p#`)
    /// infix by convention.
    Partitioned,
    /// Metadata generated fresh on the destination rather than copied
    /// byte-for-byte (for example a storage engine's discovery cache).
    GeneratedMetadata,
    /// A redo/write-ahead log segment, block-addressed and streamed by
    /// LSN horizon rather than as a one-shot file copy.
    RedoLog,
    /// Metadata that can be rewritten in place while its owning table is
    /// still open (a CSV engine's `.CSM` marker, an engine-local `.cfg` or
    /// dynamic-metadata file). Skipped during non-finalizing copy passes
    /// since it could race a concurrent rewrite; sent only once the stage
    /// that copies it is finalizing.
    RewriteableMeta,
}

impl FileClass {
    /// Classifies a file purely from its name, the same information
    /// available to a destination seeing only the wire `name` field.
    #[must_use]
    pub fn classify(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();

        if lower.starts_with("aria_log.") || lower.starts_with("ib_logfile") {
            return Self::RedoLog;
        }
        if lower.ends_with(".cfg") || lower.ends_with(".csm") || lower == "innodb_dynamic_metadata" {
            return Self::RewriteableMeta;
        }
        if lower.ends_with(".frm") || lower.ends_with("_mysql.cache") {
            return Self::GeneratedMetadata;
        }
        if lower.contains("#p#") {
            return Self::Partitioned;
        }
        if lower.ends_with(".mad") || lower.ends_with(".myd") || lower.ends_with(".csv") {
            return Self::AppendOnlyLog;
        }
        if lower.ends_with("aria_state") || lower.ends_with(".stat") {
            return Self::Statistics;
        }
        Self::Plain
    }

    #[must_use]
    pub fn is_block_addressed(self) -> bool {
        matches!(self, Self::Partitioned | Self::RedoLog)
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plain => "plain",
            Self::AppendOnlyLog => "append_only_log",
            Self::Statistics => "statistics",
            Self::Partitioned => "partitioned",
            Self::GeneratedMetadata => "generated_metadata",
            Self::RedoLog => "redo_log",
            Self::RewriteableMeta => "rewriteable_meta",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_redo_log_files() {
        assert_eq!(FileClass::classify("aria_log.00000001"), FileClass::RedoLog);
        assert_eq!(FileClass::classify("ib_logfile0"), FileClass::RedoLog);
    }

    #[test]
    fn classifies_partitioned_tables() {
        assert_eq!(FileClass::classify("orders#P#p0.ibd"), FileClass::Partitioned);
        assert_eq!(FileClass::classify("orders#p#p0.ibd"), FileClass::Partitioned);
    }

    #[test]
    fn classifies_plain_by_default() {
        assert_eq!(FileClass::classify("t1.ibd"), FileClass::Plain);
    }

    #[test]
    fn classifies_log_table_csv_and_its_rewriteable_marker() {
        assert_eq!(FileClass::classify("log.CSV"), FileClass::AppendOnlyLog);
        assert_eq!(FileClass::classify("log.CSM"), FileClass::RewriteableMeta);
    }

    #[test]
    fn partitioned_and_redo_are_block_addressed() {
        assert!(FileClass::Partitioned.is_block_addressed());
        assert!(FileClass::RedoLog.is_block_addressed());
        assert!(!FileClass::Plain.is_block_addressed());
    }
}
