//! MPT proof verification tool
//!
//! Verify a raw proof:
//! ```shell
//! cargo run --release -- node --root 0x.. --key 0x.. --proof 0x.. --proof 0x.. --value 0x..
//! ```
//! or the account and storage proofs of a saved `eth_getProof` response:
//! ```shell
//! RUST_LOG=debug cargo run --release -- account --file proof.json --state-root 0x..
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use eyre::{bail, WrapErr};
use mpt_verifier::hex_serde::{decode_hex, encode_hex};
use mpt_verifier::{AccountProofResponse, MPTProofInput, ProofRequest, VerificationOutcome, H256};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Verify Merkle Patricia Trie proofs from hex arguments or eth_getProof files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print one JSON report per proof instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Also print the ABI-encoded public values of each result
    #[arg(long, global = true)]
    abi: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a single proof given as hex arguments
    Node {
        /// Trie root hash
        #[arg(long)]
        root: String,

        /// Trie key, already hashed for secure tries
        #[arg(long)]
        key: String,

        /// RLP-encoded proof node, root first; repeat for each node
        #[arg(long = "proof")]
        proof: Vec<String>,

        /// Value the proof is expected to show
        #[arg(long)]
        value: Option<String>,
    },
    /// Verify the account and storage proofs of an eth_getProof response
    Account(ResponseArgs),
    /// Print the verification requests shaped from an eth_getProof response
    Request(ResponseArgs),
}

#[derive(Args, Debug)]
struct ResponseArgs {
    /// eth_getProof result, bare or inside a JSON-RPC envelope
    #[arg(long, env = "MPT_PROOF_FILE")]
    file: PathBuf,

    /// State root of the block the proof was taken at
    #[arg(long, env = "MPT_STATE_ROOT")]
    state_root: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseFile {
    Envelope { result: AccountProofResponse },
    Bare(AccountProofResponse),
}

impl ResponseFile {
    fn into_response(self) -> AccountProofResponse {
        match self {
            ResponseFile::Envelope { result } => result,
            ResponseFile::Bare(response) => response,
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    label: String,
    root: String,
    key: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    abi: Option<String>,
}

impl Report {
    fn new(
        label: String,
        input: &MPTProofInput,
        outcome: &VerificationOutcome,
        verified: bool,
    ) -> Self {
        let (status, value, reason) = match outcome {
            VerificationOutcome::Present(value) => ("present", Some(encode_hex(value)), None),
            VerificationOutcome::Absent => ("absent", None, None),
            VerificationOutcome::Invalid(reason) => ("invalid", None, Some(reason.to_string())),
        };
        Self {
            label,
            root: encode_hex(&input.root),
            key: encode_hex(&input.key),
            status,
            value,
            reason,
            verified,
            abi: None,
        }
    }

    fn print(&self, json: bool) -> eyre::Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
            return Ok(());
        }

        println!("{}:", self.label);
        println!("  Root: {}", self.root);
        println!("  Key: {}", self.key);
        println!("  Status: {}", self.status);
        if let Some(value) = &self.value {
            println!("  Value: {value}");
        }
        if let Some(reason) = &self.reason {
            println!("  Reason: {reason}");
        }
        println!("  Verified: {}", self.verified);
        if let Some(abi) = &self.abi {
            println!("  ABI: {abi}");
        }
        Ok(())
    }
}

fn main() -> eyre::Result<ExitCode> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let reports = match cli.command {
        Command::Node { root, key, proof, value } => {
            let input = MPTProofInput {
                root: parse_root(&root)?,
                key: decode_hex(&key).wrap_err("invalid --key")?,
                proof: proof
                    .iter()
                    .map(|node| decode_hex(node))
                    .collect::<Result<Vec<_>, _>>()
                    .wrap_err("invalid --proof")?,
                value: value.as_deref().map(decode_hex).transpose().wrap_err("invalid --value")?,
            };
            vec![verify_input("proof".to_string(), input, cli.abi)]
        }
        Command::Account(args) => {
            let requests = load_requests(&args)?;
            requests
                .into_iter()
                .enumerate()
                .map(|(i, request)| verify_request(label(i), request, cli.abi))
                .collect()
        }
        Command::Request(args) => {
            let requests = load_requests(&args)?;
            println!("{}", serde_json::to_string_pretty(&requests)?);
            return Ok(ExitCode::SUCCESS);
        }
    };

    for report in &reports {
        report.print(cli.json)?;
    }

    let failed = reports.iter().filter(|report| !report.verified).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "verification failed");
        return Ok(ExitCode::FAILURE);
    }
    info!(total = reports.len(), "all proofs verified");
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn label(index: usize) -> String {
    match index {
        0 => "account".to_string(),
        n => format!("storage[{}]", n - 1),
    }
}

fn parse_root(s: &str) -> eyre::Result<H256> {
    let bytes = decode_hex(s).wrap_err("invalid root")?;
    match H256::try_from(bytes.as_slice()) {
        Ok(root) => Ok(root),
        Err(_) => bail!("root must be 32 bytes, got {}", bytes.len()),
    }
}

fn load_requests(args: &ResponseArgs) -> eyre::Result<Vec<ProofRequest>> {
    let raw = std::fs::read_to_string(&args.file)
        .wrap_err_with(|| format!("failed to read {}", args.file.display()))?;
    let response = parse_response(&raw)?;
    info!(
        address = %encode_hex(&response.address),
        nodes = response.account_proof.len(),
        slots = response.storage_proof.len(),
        "loaded proof response"
    );
    Ok(response.requests(parse_root(&args.state_root)?))
}

fn parse_response(raw: &str) -> eyre::Result<AccountProofResponse> {
    let file: ResponseFile = serde_json::from_str(raw).wrap_err("malformed eth_getProof response")?;
    Ok(file.into_response())
}

fn verify_request(label: String, request: ProofRequest, abi: bool) -> Report {
    let outcome = request.verify();
    let verified = request.accepts(&outcome);
    finish(label, request.into_input(), outcome, verified, abi)
}

fn verify_input(label: String, input: MPTProofInput, abi: bool) -> Report {
    let outcome = input.verify();
    let verified = input.accepts(&outcome);
    finish(label, input, outcome, verified, abi)
}

fn finish(
    label: String,
    input: MPTProofInput,
    outcome: VerificationOutcome,
    verified: bool,
    abi: bool,
) -> Report {
    let mut report = Report::new(label, &input, &outcome, verified);
    if abi {
        let mut result = input.result(&outcome);
        result.verified = verified;
        report.abi = Some(encode_hex(&result.abi_encode()));
    }
    report
}
