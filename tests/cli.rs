mod common;

use algo_signing_pipeline::tx::{assign_group_id, codec};
use algo_signing_pipeline::{Address, Network};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::payment;
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_cli(args: &[&str], request: &serde_json::Value) -> Output {
    let binary_path = assert_cmd::cargo::cargo_bin!("txn-inspect");
    let mut child = Command::new(binary_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("cli starts");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(request.to_string().as_bytes())
        .expect("request written");
    child.wait_with_output().expect("cli exits")
}

fn request(network: &str, txns: &[rmpv::Value], owner: &Address) -> serde_json::Value {
    let transactions: Vec<serde_json::Value> = txns
        .iter()
        .map(|txn| serde_json::json!({ "txn": STANDARD.encode(codec::encode_canonical(txn)) }))
        .collect();
    serde_json::json!({
        "network": network,
        "transactions": transactions,
        "accounts": [{ "address": owner.encode(), "backing": { "type": "software" } }],
    })
}

fn parse(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout is utf8");
    serde_json::from_str(&stdout).expect("stdout is valid json")
}

#[test]
fn cli_reports_accepted_group() {
    let owner = Address::from_bytes([1u8; 32]);
    let receiver = Address::from_bytes([2u8; 32]);
    let mut txns = vec![
        payment(&owner, &receiver, 10, &Network::mainnet()),
        payment(&owner, &receiver, 20, &Network::mainnet()),
    ];
    assign_group_id(&mut txns);

    let output = run_cli(&["--json"], &request("mainnet", &txns, &owner));
    assert!(output.status.success(), "cli exited unsuccessfully: {:?}", output);

    let response = parse(&output);
    assert_eq!(response["success"], true);
    let report = &response["data"];
    assert_eq!(report["accepted"], true);
    assert_eq!(report["network"], "mainnet-v1.0");
    assert_eq!(report["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(report["groups"].as_array().unwrap().len(), 1);
    assert_eq!(report["groups"][0]["members"], serde_json::json!([0, 1]));
    assert_eq!(report["assignments"][1]["signer"], "software");
}

#[test]
fn cli_network_override_rejects() {
    let owner = Address::from_bytes([1u8; 32]);
    let txns = vec![payment(&owner, &owner, 1, &Network::mainnet())];

    let output = run_cli(&["--json", "--network", "testnet"], &request("mainnet", &txns, &owner));
    assert!(!output.status.success());

    let report = &parse(&output)["data"];
    assert_eq!(report["accepted"], false);
    assert_eq!(report["rejection"]["code"], "network_mismatch");
    assert_eq!(report["rejection"]["index"], 0);
}

#[test]
fn cli_preset_allows_rekey_with_warning() {
    let owner = Address::from_bytes([1u8; 32]);
    let new_auth = Address::from_bytes([7u8; 32]);
    let txn = common::with_address(payment(&owner, &owner, 0, &Network::mainnet()), "rekey", &new_auth);
    let body = request("mainnet", &[txn], &owner);

    let output = run_cli(&["--json"], &body);
    assert!(!output.status.success());
    assert_eq!(parse(&output)["data"]["rejection"]["code"], "rekey_not_allowed");

    let output = run_cli(&["--json", "--preset", "rekey"], &body);
    assert!(output.status.success(), "cli exited unsuccessfully: {:?}", output);
    let report = &parse(&output)["data"];
    assert_eq!(report["warnings"][0]["type"], "rekey");
}

#[test]
fn cli_malformed_transaction_is_an_error() {
    let body = serde_json::json!({
        "network": "mainnet",
        "transactions": [{ "txn": "not base64!" }],
    });

    let output = run_cli(&["--json"], &body);
    assert!(!output.status.success());
    let response = parse(&output);
    assert_eq!(response["success"], false);
    assert_eq!(response["error"]["code"], "malformed_transaction");
}

#[test]
fn cli_table_output() {
    let owner = Address::from_bytes([1u8; 32]);
    let txns = vec![payment(&owner, &owner, 1, &Network::mainnet())];

    let output = run_cli(&[], &request("mainnet", &txns, &owner));
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout is utf8");
    assert!(stdout.contains("Network: mainnet-v1.0"));
    assert!(stdout.contains("Verdict: ✅ Accepted"));
}
