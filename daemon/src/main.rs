//! Tessera daemon: operate on a node's LMDB data directory.
//!
//! Requests and responses are read and written as the JSON wire messages,
//! so the daemon can answer a peer's catchup or hash-tree request offline
//! and apply what a peer sent back.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tessera_messages::{CatchupChain, CatchupRequest, HashTreeRequest, HashTreeResponse};
use tessera_node::{init_logging, open_checked, ConsensusCore, LogFormat, NodeConfig};
use tessera_store_lmdb::check_integrity;

#[derive(Parser)]
#[command(name = "tessera-daemon", about = "Tessera consensus core daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the LMDB environment.
    #[arg(long, env = "TESSERA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TESSERA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TESSERA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Check that every database exists and cross-references resolve.
    Integrity,
    /// Print stability and catchup progress.
    Status,
    /// Print the effective configuration as TOML.
    Config,
    /// Print the next request this node should send: a hash-tree request
    /// while catching up, otherwise a catchup request.
    NextRequest,
    /// Answer a catchup request read from a JSON file.
    PrepareCatchup {
        #[arg(long)]
        request: PathBuf,
    },
    /// Answer a hash-tree request read from a JSON file.
    HashTree {
        #[arg(long)]
        request: PathBuf,
    },
    /// Verify a catchup chain read from a JSON file and queue its balls.
    ApplyCatchup {
        #[arg(long)]
        chain: PathBuf,
    },
    /// Verify and store a hash tree read from a JSON file.
    ApplyHashTree {
        #[arg(long)]
        tree: PathBuf,
    },
    /// Abandon an in-progress catchup.
    PurgeCatchup,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    config.validate()?;
    Ok(config)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    tessera_messages::from_json(&text).with_context(|| format!("decoding {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_witnesses(config: &NodeConfig) -> anyhow::Result<()> {
    if config.witnesses.is_empty() {
        bail!("no witness list configured");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);

    match &cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Integrity => {
            let env = open_checked(&config.data_dir, config.lmdb_max_dbs, config.lmdb_map_size)?;
            let report = check_integrity(&env)?;
            print_json(&serde_json::json!({
                "databases_checked": report.databases_checked,
                "total_entries": report.total_entries,
                "errors": report.errors,
            }))?;
            if !report.is_healthy() {
                bail!("integrity check found {} problem(s)", report.errors.len());
            }
        }
        Command::Status => {
            let (core, _) = ConsensusCore::open(&config)?;
            print_json(&core.status()?)?;
        }
        Command::NextRequest => {
            let (core, _) = ConsensusCore::open(&config)?;
            match core.next_hash_tree_request()? {
                Some(request) => print_json(&request)?,
                None => {
                    require_witnesses(&config)?;
                    print_json(&core.catchup_request()?)?;
                }
            }
        }
        Command::PrepareCatchup { request } => {
            let request: CatchupRequest = read_json(request)?;
            let (core, _) = ConsensusCore::open(&config)?;
            print_json(&core.prepare_catchup_chain(&request).await?)?;
        }
        Command::HashTree { request } => {
            let request: HashTreeRequest = read_json(request)?;
            let (core, _) = ConsensusCore::open(&config)?;
            print_json(&core.read_hash_tree(&request).await?)?;
        }
        Command::ApplyCatchup { chain } => {
            require_witnesses(&config)?;
            let chain: CatchupChain = read_json(chain)?;
            let (core, _) = ConsensusCore::open(&config)?;
            let queue = core.process_catchup_chain(&chain).await?;
            print_json(&queue)?;
        }
        Command::ApplyHashTree { tree } => {
            let tree: HashTreeResponse = read_json(tree)?;
            let (core, _) = ConsensusCore::open(&config)?;
            let outcome = core.process_hash_tree(&tree.balls).await?;
            let done = core.finish_catchup_if_done().await?;
            print_json(&serde_json::json!({
                "accepted": outcome.accepted,
                "dequeued": outcome.dequeued,
                "purged": outcome.purged,
                "max_parent_mci": outcome.max_parent_mci,
                "catchup_done": done,
            }))?;
        }
        Command::PurgeCatchup => {
            let (core, _) = ConsensusCore::open(&config)?;
            core.purge_catchup().await?;
            tracing::info!("catchup state cleared");
        }
    }
    Ok(())
}
