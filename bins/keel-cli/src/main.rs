//! keel-cli: Operator tool for the Keel sync checkpoint authority.
//!
//! Generates master keys, signs and inspects checkpoint messages offline,
//! and queries or drives a running node over JSON-RPC.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::HttpClientBuilder;

use keel_checkpoint::{CheckpointAuthority, SignedCheckpoint, UnsignedCheckpoint};
use keel_core::constants::NetworkType;
use keel_core::crypto::KeyPair;
use keel_core::types::Hash256;
use keel_network::CheckpointCodec;

/// Keel checkpoint operator interface.
#[derive(Parser)]
#[command(name = "keel-cli")]
#[command(version, about = "Sync checkpoint operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new checkpoint master key pair.
    Keygen,
    /// Sign a checkpoint for a block hash and print the wire message as hex.
    Sign(SignArgs),
    /// Decode and verify a hex wire message.
    Verify(VerifyArgs),
    /// Query a node's active checkpoint.
    Status(StatusArgs),
    /// Ask a master node to sign and broadcast a checkpoint.
    Send(SendArgs),
}

#[derive(Args)]
struct SignArgs {
    /// Hex-encoded master secret key (32 bytes).
    #[arg(short, long)]
    key: String,

    /// Block hash to checkpoint (64 hex characters).
    hash: String,

    /// Network whose magic bytes frame the message.
    #[arg(short, long, default_value = "mainnet")]
    network: String,
}

#[derive(Args)]
struct VerifyArgs {
    /// Hex-encoded authority public key (default: the network's key).
    #[arg(short, long)]
    pubkey: Option<String>,

    /// Hex wire message as printed by `sign`.
    message: String,

    /// Network whose magic bytes frame the message.
    #[arg(short, long, default_value = "mainnet")]
    network: String,
}

#[derive(Args)]
struct StatusArgs {
    /// RPC endpoint URL.
    #[arg(short, long, default_value = "http://127.0.0.1:19332")]
    rpc: String,
}

#[derive(Args)]
struct SendArgs {
    /// Block hash to checkpoint (64 hex characters).
    hash: String,

    /// RPC endpoint URL.
    #[arg(short, long, default_value = "http://127.0.0.1:19332")]
    rpc: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => keygen(),
        Commands::Sign(args) => println!("{}", sign(&args)?),
        Commands::Verify(args) => println!("{}", verify(&args)?),
        Commands::Status(args) => status(args).await?,
        Commands::Send(args) => send(args).await?,
    }
    Ok(())
}

fn parse_network(name: &str) -> Result<NetworkType> {
    match name {
        "mainnet" => Ok(NetworkType::Mainnet),
        "testnet" => Ok(NetworkType::Testnet),
        "regtest" => Ok(NetworkType::Regtest),
        other => bail!("unknown network '{other}' (expected mainnet, testnet or regtest)"),
    }
}

fn parse_hash(hex_str: &str) -> Result<Hash256> {
    Hash256::from_hex(hex_str).with_context(|| format!("invalid block hash '{hex_str}'"))
}

fn keygen() {
    let keypair = KeyPair::generate();
    println!("public key: {}", keypair.public_key());
    println!("secret key: {}", keypair.secret_hex());
}

/// Sign a checkpoint offline and return the framed message as hex.
fn sign(args: &SignArgs) -> Result<String> {
    let network = parse_network(&args.network)?;
    let master = KeyPair::from_hex(&args.key).context("invalid master key")?;
    let target = parse_hash(&args.hash)?;
    let message = SignedCheckpoint::sign(UnsignedCheckpoint::new(target), &master);
    let framed = CheckpointCodec::new(network)
        .encode(&message)
        .context("failed to encode checkpoint message")?;
    Ok(hex::encode(framed))
}

/// Decode a framed message and check its signature.
fn verify(args: &VerifyArgs) -> Result<String> {
    let network = parse_network(&args.network)?;
    let pubkey = args
        .pubkey
        .as_deref()
        .unwrap_or_else(|| network.checkpoint_pubkey());
    let authority = CheckpointAuthority::from_hex(pubkey).context("invalid public key")?;
    let bytes = hex::decode(args.message.trim()).context("message is not hex")?;
    let message = CheckpointCodec::new(network)
        .decode(&bytes)
        .context("failed to decode checkpoint message")?;
    let checked = authority
        .authenticate(&message)
        .context("checkpoint message failed verification")?;
    Ok(format!(
        "valid: {}",
        UnsignedCheckpoint {
            version: checked.version,
            target: checked.target,
        }
    ))
}

async fn status(args: StatusArgs) -> Result<()> {
    let client = HttpClientBuilder::default()
        .build(&args.rpc)
        .context("Failed to connect to RPC")?;
    let status: serde_json::Value = client
        .request("getcheckpoint", ArrayParams::new())
        .await
        .context("RPC getcheckpoint failed")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn send(args: SendArgs) -> Result<()> {
    parse_hash(&args.hash)?;
    let client = HttpClientBuilder::default()
        .build(&args.rpc)
        .context("Failed to connect to RPC")?;
    let mut params = ArrayParams::new();
    params.insert(args.hash.clone())?;
    let result: serde_json::Value = client
        .request("sendcheckpoint", params)
        .await
        .context("RPC sendcheckpoint failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
