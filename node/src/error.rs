use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("consensus error: {0}")]
    Consensus(#[from] tessera_consensus::ConsensusError),

    #[error("witness error: {0}")]
    Witness(#[from] tessera_witness::WitnessError),

    #[error("catchup error: {0}")]
    Catchup(#[from] tessera_catchup::CatchupError),

    #[error("store error: {0}")]
    Store(#[from] tessera_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] tessera_store_lmdb::LmdbError),

    #[error("invalid parameters: {0}")]
    Params(#[from] tessera_types::TesseraError),

    #[error("config error: {0}")]
    Config(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
