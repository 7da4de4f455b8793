use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use distorage_p2p::{DecoderKind, HandshakeKind};
use distorage_store::{PathTransform, DEFAULT_ROOT};

#[derive(Parser)]
#[command(
    name = "distorage",
    about = "Content-addressable storage node",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a storage node until Ctrl-C
    Serve(ServeArgs),
    /// Store a file (or stdin) under a key
    Put(PutArgs),
    /// Write the object stored under a key to stdout
    Get(KeyArgs),
    /// Check whether a key is stored
    Has(KeyArgs),
    /// Delete a key along with its shard
    Rm(KeyArgs),
    /// Print the on-disk location of a key
    Path(KeyArgs),
    /// Remove the whole storage root
    Purge(StoreArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML node configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub listen: Option<String>,
    #[arg(long)]
    pub root: Option<PathBuf>,
    #[arg(long)]
    pub decoder: Option<DecoderKind>,
    #[arg(long)]
    pub handshake: Option<HandshakeKind>,
    #[arg(long)]
    pub transform: Option<PathTransform>,
    /// Stop the node after this many seconds
    #[arg(long, value_name = "SECS")]
    pub stop_after: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    #[arg(long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,
    #[arg(long, default_value = "cas")]
    pub transform: PathTransform,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct PutArgs {
    pub key: String,
    /// Input file; stdin when omitted
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub store: StoreArgs,
}
