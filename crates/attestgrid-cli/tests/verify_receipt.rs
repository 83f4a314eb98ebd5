//! Offline verification of receipts issued by a node.

use std::path::Path;
use std::sync::Arc;

use attestgrid_cli::stats::{run_stats, StatsArgs};
use attestgrid_cli::verify::{run_verify, VerifyArgs};
use attestgrid_core::ValidatorResult;
use attestgrid_crypto::{select_backend, BackendPreference, KeyManager, SecretSeed};
use attestgrid_node::{AttestationNode, FileReceiptStore, NodeConfig, TaskOutput};
use serde_json::{json, Value};

const PUBLIC_KEY: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";

fn node(store_root: &Path) -> AttestationNode {
    AttestationNode::new(
        NodeConfig {
            node_id: "node-1".into(),
            ..NodeConfig::default()
        },
        Arc::new(KeyManager::from_seed(
            SecretSeed::from_bytes([7u8; 32]),
            select_backend(BackendPreference::Auto),
        )),
        Arc::new(FileReceiptStore::open(store_root).unwrap()),
    )
}

fn sum_task(input: &Value, _: &Value) -> Result<TaskOutput<Value>, std::io::Error> {
    let sum = input["a"].as_i64().unwrap_or(0) + input["b"].as_i64().unwrap_or(0);
    Ok(TaskOutput {
        output: json!({"result": sum}),
        validator: ValidatorResult::pass(),
    })
}

fn verify(receipt: &Path, pubkey: &str) -> (anyhow::Result<u8>, String) {
    let args = VerifyArgs {
        receipt: receipt.to_path_buf(),
        pubkey: pubkey.to_string(),
        backend: BackendPreference::Auto,
    };
    let mut out = Vec::new();
    let result = run_verify(&args, &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn issued_receipt_verifies_and_tampering_fails() {
    let dir = tempfile::tempdir().unwrap();
    let receipt = node(&dir.path().join("store"))
        .attest("t1", &json!({"a": 1, "b": 2}), &json!({"max": 10}), sum_task)
        .unwrap();
    let mut value = serde_json::to_value(&receipt).unwrap();

    let path = dir.path().join("receipt.json");
    std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    let (result, output) = verify(&path, PUBLIC_KEY);
    assert_eq!(result.unwrap(), 0);
    assert!(output.contains("Verifying receipt for task: t1"));
    assert!(output.contains("VERIFICATION SUCCESSFUL"));
    assert!(output.contains(
        "Receipt hash: 3eb4c8c7b92660647c3897b5afd5e1c9cc89b49c29f749f081a4ca73788b8231"
    ));

    value["validator"]["passed"] = json!(false);
    std::fs::write(&path, value.to_string()).unwrap();
    let (result, output) = verify(&path, PUBLIC_KEY);
    assert_eq!(result.unwrap(), 1);
    assert!(output.contains("VERIFICATION FAILED"));
}

#[test]
fn public_key_may_be_given_as_file() {
    let dir = tempfile::tempdir().unwrap();
    let receipt = node(&dir.path().join("store"))
        .attest("t1", &json!({"a": 1}), &json!({}), sum_task)
        .unwrap();
    let path = dir.path().join("receipt.json");
    std::fs::write(&path, serde_json::to_string(&receipt).unwrap()).unwrap();
    let key_file = dir.path().join("ed25519_public.hex");
    std::fs::write(&key_file, PUBLIC_KEY).unwrap();

    let (result, _) = verify(&path, key_file.to_str().unwrap());
    assert_eq!(result.unwrap(), 0);
}

#[test]
fn malformed_receipt_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipt.json");

    std::fs::write(&path, "{not json").unwrap();
    assert!(verify(&path, PUBLIC_KEY).0.is_err());

    std::fs::write(&path, r#"{"task_id": "t1", "signature": "00"}"#).unwrap();
    assert!(verify(&path, PUBLIC_KEY).0.is_err());

    assert!(verify(&dir.path().join("absent.json"), PUBLIC_KEY).0.is_err());
}

#[test]
fn store_rollup_counts_blocked_receipts() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let node = node(&store);
    for i in 0..4 {
        let rules = if i == 0 {
            json!({"required_keys": ["absent"]})
        } else {
            json!({})
        };
        node.attest(&format!("t{i}"), &json!({"a": i}), &rules, attestgrid_node::passthrough_task)
            .unwrap();
    }

    let args = StatsArgs {
        store: Some(store),
        from_json: None,
        verifications: 2,
        readme: None,
    };
    let mut out = Vec::new();
    assert_eq!(run_stats(&args, &mut out).unwrap(), 0);
    let stats: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(stats["receipts_total"], 4);
    assert_eq!(stats["passed_false"], 1);
    assert_eq!(stats["verifications_total"], 2);
    assert_eq!(stats["block_rate"], 0.25);
}
