use std::collections::HashMap;
use std::path::Path;

use clone_jobs::CloneError;
use jwalk::WalkDir;
use tracing::debug;

use crate::file_class::FileClass;
use crate::table::{Partition, Table};

/// Walks a data directory and groups its files into [`Table`] units.
///
/// Each immediate child of `data_dir` is treated as a database directory;
/// files within it become wire names of the form `db/file`. Partitioned
/// table leaves sharing a base name are merged into one
/// [`Table::Partitioned`] so the engine schedules them together.
///
/// # Errors
/// Returns [`CloneError::Io`] if the walk cannot read `data_dir` or one of
/// its entries.
pub fn discover_tables(data_dir: &Path) -> Result<Vec<Table>, CloneError> {
    let mut by_identity: HashMap<String, Table> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for entry in WalkDir::new(data_dir).sort(true) {
        let entry = entry.map_err(|e| {
            CloneError::io("walking data directory", std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(data_dir).unwrap_or(&path);
        let wire_name = relative.to_string_lossy().replace('\\', "/");

        debug!(wire_name = %wire_name, class = %FileClass::classify(&wire_name), "discovered source file");

        let table = Table::from_file(wire_name, path.clone());
        let identity = table.identity().to_string();

        match by_identity.get_mut(&identity) {
            Some(Table::Partitioned { partitions, .. }) => {
                if let Table::Partitioned { partitions: mut new_parts, .. } = table {
                    partitions.append(&mut new_parts);
                }
            }
            Some(_) => {}
            None => {
                order.push(identity.clone());
                by_identity.insert(identity, table);
            }
        }
    }

    Ok(order.into_iter().filter_map(|id| by_identity.remove(&id)).collect())
}

/// Splits a wire name of the form `db/file` into its database and file
/// components. Names with no directory component are treated as having an
/// empty database (used for server-wide files like redo logs).
#[must_use]
pub fn split_wire_name(wire_name: &str) -> (&str, &str) {
    match wire_name.split_once('/') {
        Some((db, file)) => (db, file),
        None => ("", wire_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn groups_partitions_under_one_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("shop");
        fs::create_dir(&db).unwrap();
        fs::write(db.join("orders#P#p0.ibd"), b"a").unwrap();
        fs::write(db.join("orders#P#p1.ibd"), b"b").unwrap();
        fs::write(db.join("customers.ibd"), b"c").unwrap();

        let tables = discover_tables(dir.path()).unwrap();
        let partitioned: Vec<_> =
            tables.iter().filter(|t| matches!(t, Table::Partitioned { .. })).collect();
        assert_eq!(partitioned.len(), 1);
        assert_eq!(partitioned[0].files().len(), 2);

        let plain_count =
            tables.iter().filter(|t| matches!(t, Table::Plain { .. })).count();
        assert_eq!(plain_count, 1);
    }

    #[test]
    fn split_wire_name_separates_db_and_file() {
        assert_eq!(split_wire_name("shop/orders.ibd"), ("shop", "orders.ibd"));
        assert_eq!(split_wire_name("aria_log.00000001"), ("", "aria_log.00000001"));
    }
}
