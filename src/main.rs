//! txn-inspect
//!
//! Decodes, groups and validates a WalletConnect transaction batch and
//! prints what would be signed, by whom, and whether the policy gate
//! accepts it. Nothing is signed.

use algo_signing_pipeline::inspect::{self, InspectReport, InspectRequest, NetworkSpec};
use algo_signing_pipeline::utils::pipeline_config::{CallSite, PipelineConfig};
use algo_signing_pipeline::ApiResponse;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Dapp,
    Swap,
    Rekey,
}

impl From<Preset> for CallSite {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Dapp => CallSite::DappApproval,
            Preset::Swap => CallSite::Swap,
            Preset::Rekey => CallSite::Rekey,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "txn-inspect", version, about = "Inspect an Algorand signing request")]
struct Cli {
    /// Request JSON file; reads stdin when omitted
    request: Option<PathBuf>,

    /// Override the session network (mainnet, testnet, betanet)
    #[arg(long)]
    network: Option<String>,

    /// Apply a call-site preset instead of the request's config
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Print the JSON envelope instead of a table
    #[arg(long)]
    json: bool,
}

fn read_request(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).context("reading stdin")?;
            Ok(buffer)
        }
    }
}

fn print_report(report: &InspectReport) {
    println!("================ Signing Request ================");
    println!("Network: {}", report.network);
    for tx in &report.transactions {
        let signer = report
            .assignments
            .iter()
            .find(|a| a.index == tx.index)
            .map(|a| a.signer)
            .unwrap_or("-");
        println!(
            "[{}] {:<6} {:<10} amount={:<12} signer={}",
            tx.index,
            tx.kind,
            &tx.tx_id[..10],
            tx.amount,
            signer
        );
    }

    println!("Groups:");
    for group in &report.groups {
        println!("    {:<14} members={:?}", group.label(), group.members);
    }

    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }

    println!("=================================================");
    match &report.rejection {
        None => println!("Verdict: ✅ Accepted"),
        Some(rejection) => println!("Verdict: ❌ Rejected ({:?}): {}", rejection.code, rejection.message),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let payload = read_request(cli.request.as_ref())?;
    let mut request: InspectRequest = serde_json::from_str(&payload).context("parsing request JSON")?;
    if let Some(network) = cli.network {
        request.network = NetworkSpec::Named(network);
    }
    if let Some(preset) = cli.preset {
        request.config = Some(PipelineConfig::for_call_site(preset.into()));
    }

    let result = inspect::inspect(&request);
    if cli.json {
        let envelope = match &result {
            Ok(report) => serde_json::to_string_pretty(&ApiResponse::ok(report))?,
            Err(error) => serde_json::to_string_pretty(&ApiResponse::<()>::err(error.clone()))?,
        };
        println!("{}", envelope);
    } else {
        match &result {
            Ok(report) => print_report(report),
            Err(error) => eprintln!("Error: {}", error.message),
        }
    }

    Ok(match result {
        Ok(report) if report.accepted => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
