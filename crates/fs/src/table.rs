use std::path::{Path, PathBuf};

use crate::file_class::FileClass;

/// One leaf file of a partitioned table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Partition {
    /// Wire name this partition's file is sent under, e.g.
    /// `db/orders#P#p0.ibd`.
    pub wire_name: String,
    pub path: PathBuf,
}

/// A single source-side unit of copy work: a plain file, an append-only
/// log, a statistics file, or the set of partitions making up one
/// partitioned table.
///
/// Grouping partitions under one `Table::Partitioned` rather than exposing
/// them as independent plain tables lets the engine schedule all of a
/// table's partitions together and report one combined failure if any
/// partition's copy fails.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Table {
    Plain { wire_name: String, path: PathBuf },
    AppendOnlyLog { wire_name: String, path: PathBuf },
    Statistics { wire_name: String, path: PathBuf },
    Partitioned { base_name: String, partitions: Vec<Partition> },
}

impl Table {
    /// Builds the right `Table` variant for a single file discovered under
    /// the data directory, given its wire-relative name.
    #[must_use]
    pub fn from_file(wire_name: String, path: PathBuf) -> Self {
        match FileClass::classify(&wire_name) {
            FileClass::Partitioned => {
                let base_name = base_table_name(&wire_name);
                Self::Partitioned {
                    base_name,
                    partitions: vec![Partition { wire_name, path }],
                }
            }
            // A rewriteable-marker file (e.g. `.CSM`) is scheduled and
            // skipped-until-finalize the same way its log table's other
            // files are, so it rides along under the same table class.
            FileClass::AppendOnlyLog | FileClass::RewriteableMeta => {
                Self::AppendOnlyLog { wire_name, path }
            }
            FileClass::Statistics => Self::Statistics { wire_name, path },
            _ => Self::Plain { wire_name, path },
        }
    }

    /// Merges another partition leaf discovered for the same base table
    /// name into an existing `Partitioned` table.
    pub fn merge_partition(&mut self, partition: Partition) {
        if let Self::Partitioned { partitions, .. } = self {
            partitions.push(partition);
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::Plain { wire_name, .. }
            | Self::AppendOnlyLog { wire_name, .. }
            | Self::Statistics { wire_name, .. } => wire_name,
            Self::Partitioned { base_name, .. } => base_name,
        }
    }

    /// All (wire_name, path) pairs this table needs copied, in a stable
    /// order.
    #[must_use]
    pub fn files(&self) -> Vec<(String, PathBuf)> {
        match self {
            Self::Plain { wire_name, path }
            | Self::AppendOnlyLog { wire_name, path }
            | Self::Statistics { wire_name, path } => vec![(wire_name.clone(), path.clone())],
            Self::Partitioned { partitions, .. } => {
                partitions.iter().map(|p| (p.wire_name.clone(), p.path.clone())).collect()
            }
        }
    }
}

/// Strips a `#P#...` (or lowercase `#p#...`) infix and the extension,
/// leaving the logical table name shared by every partition's file.
fn base_table_name(wire_name: &str) -> String {
    let name = Path::new(wire_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| wire_name.to_string());
    let lower = name.to_ascii_lowercase();
    if let Some(idx) = lower.find("#p#") {
        name[..idx].to_string()
    } else {
        name
    }
}
