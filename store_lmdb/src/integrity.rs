//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node serves
//! catchup requests or accepts hash trees.

use std::path::Path;

use heed::types::Bytes;

use crate::environment::DATABASE_NAMES;
use crate::keys::decode_unit_id;
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check LMDB database integrity.
///
/// Opens each expected database and counts its entries, then verifies that
/// every props row has matching unit content and that the main-chain index
/// points at stored units. Read failures are recorded in the report rather
/// than causing a hard error.
pub fn check_integrity(store: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let env = store.env();
    let rtxn = env.read_txn()?;

    for &db_name in DATABASE_NAMES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{db_name}': {e}")),
                }
            }
            Ok(None) => report.errors.push(format!("database '{db_name}' is missing")),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{db_name}': {e}")),
        }
    }

    for entry in store.props_db.iter(&rtxn)? {
        let (key, _) = entry?;
        match store.units_db.get(&rtxn, key)? {
            Some(_) => {}
            None => report.errors.push(format!(
                "props without unit content: {}",
                describe_unit_key(key)
            )),
        }
    }

    for entry in store.main_chain_db.iter(&rtxn)? {
        let (key, val) = entry?;
        if store.props_db.get(&rtxn, val)?.is_none() {
            let mci = key
                .try_into()
                .map(u64::from_be_bytes)
                .map_or_else(|_| "?".to_string(), |m| m.to_string());
            report.errors.push(format!(
                "main chain index {mci} points at unknown unit {}",
                describe_unit_key(val)
            ));
        }
    }

    if !report.is_healthy() {
        tracing::warn!(errors = report.errors.len(), "LMDB integrity check found problems");
    }
    Ok(report)
}

fn describe_unit_key(key: &[u8]) -> String {
    decode_unit_id(key).map_or_else(|_| hex_prefix(key), |id| id.to_string())
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_store::{BatchWriter, WriteBatch};
    use tessera_types::{UnitId, UnitProps};

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("missing")).is_ok());
        assert!(check_data_dir(dir.path()).is_err());
    }

    #[test]
    fn fresh_environment_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).unwrap();
        let report = check_integrity(&env).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked as usize, DATABASE_NAMES.len());
        assert!(check_data_dir(dir.path()).is_ok());
    }

    #[test]
    fn props_without_content_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 10 * 1024 * 1024).unwrap();
        let mut orphan = UnitProps::new(UnitId::new([5; 32]), 3);
        orphan.main_chain_index = Some(1);
        orphan.is_on_main_chain = true;
        let mut batch = WriteBatch::new();
        batch.put_props(orphan);
        env.commit(batch).unwrap();

        let report = check_integrity(&env).unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("props without unit content"));
    }
}
