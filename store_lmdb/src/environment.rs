//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

/// Raw LMDB table handle; keys and values are encoded by hand.
pub(crate) type Table = Database<Bytes, Bytes>;

/// Names of every database the environment creates, in creation order.
pub const DATABASE_NAMES: &[&str] = &[
    "units",
    "props",
    "children",
    "authored",
    "consumers",
    "balls",
    "ball_units",
    "skiplist",
    "mci_units",
    "main_chain",
    "definitions",
    "catchup_chain",
    "hash_tree",
    "meta",
];

/// Wraps the LMDB environment and all database handles.
#[derive(Clone)]
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    /// unit id → bincode `Unit`
    pub(crate) units_db: Table,
    /// unit id → bincode `UnitProps`
    pub(crate) props_db: Table,
    /// parent id ‖ child id → ()
    pub(crate) children_db: Table,
    /// len ‖ address ‖ unit id → ()
    pub(crate) authored_db: Table,
    /// spend key ‖ unit id → ()
    pub(crate) consumers_db: Table,
    /// unit id → ball
    pub(crate) balls_db: Table,
    /// ball → unit id
    pub(crate) ball_units_db: Table,
    /// unit id → bincode `Vec<UnitId>`
    pub(crate) skiplist_db: Table,
    /// mci ‖ level ‖ unit id → ()
    pub(crate) mci_units_db: Table,
    /// mci → unit id
    pub(crate) main_chain_db: Table,
    /// definition chash → bincode `Definition`
    pub(crate) definitions_db: Table,
    /// position → ball
    pub(crate) catchup_db: Table,
    /// ball → unit id
    pub(crate) hash_tree_db: Table,
    pub(crate) meta_db: Table,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per process per path and
        // the memory map is never accessed outside heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(DATABASE_NAMES.len() as u32))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut open = |name: &str| -> Result<Table, LmdbError> {
            Ok(env.create_database(&mut wtxn, Some(name))?)
        };
        let units_db = open("units")?;
        let props_db = open("props")?;
        let children_db = open("children")?;
        let authored_db = open("authored")?;
        let consumers_db = open("consumers")?;
        let balls_db = open("balls")?;
        let ball_units_db = open("ball_units")?;
        let skiplist_db = open("skiplist")?;
        let mci_units_db = open("mci_units")?;
        let main_chain_db = open("main_chain")?;
        let definitions_db = open("definitions")?;
        let catchup_db = open("catchup_chain")?;
        let hash_tree_db = open("hash_tree")?;
        let meta_db = open("meta")?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            units_db,
            props_db,
            children_db,
            authored_db,
            consumers_db,
            balls_db,
            ball_units_db,
            skiplist_db,
            mci_units_db,
            main_chain_db,
            definitions_db,
            catchup_db,
            hash_tree_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }
}
