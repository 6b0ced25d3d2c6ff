//! CLI integration tests
//!
//! These tests verify the CLI commands work correctly by running the binary.

#![cfg(feature = "cli")]

mod common;

use std::process::Command;

fn gmlschema_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gmlschema"))
}

fn schema_arg() -> String {
    common::fixture("roads.xsd").to_string_lossy().into_owned()
}

fn gml_arg() -> String {
    common::fixture("roads.gml").to_string_lossy().into_owned()
}

// ============================================================================
// Decode Command Tests
// ============================================================================

#[test]
fn test_cli_decode_document() {
    let output = gmlschema_bin()
        .args(["decode", "--schema", &schema_arg(), &gml_arg()])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "decode should succeed");
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    assert_eq!(json["id"], "network.1");
    assert_eq!(json["features"].as_array().unwrap().len(), 4);
}

#[test]
fn test_cli_decode_stream() {
    let output = gmlschema_bin()
        .args(["decode", "--stream", "--capacity", "2", "--schema", &schema_arg(), &gml_arg()])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "decode --stream should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<String> = stdout
        .lines()
        .map(|line| {
            let json: serde_json::Value = serde_json::from_str(line).unwrap();
            json["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids, vec!["road.1", "road.2", "lake.1", "lake.2"]);
}

#[test]
fn test_cli_decode_invalid_capacity() {
    let output = gmlschema_bin()
        .args(["decode", "--stream", "--capacity", "1", "--schema", &schema_arg(), &gml_arg()])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("capacity"));
}

// ============================================================================
// Inspect Command Tests
// ============================================================================

#[test]
fn test_cli_inspect_lists_features() {
    let output = gmlschema_bin()
        .args(["inspect", "--schema", &schema_arg()])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("{http://example.com/roads}Road"));
    assert!(stdout.contains("{http://example.com/roads}Lake"));
}

#[test]
fn test_cli_inspect_element() {
    let output = gmlschema_bin()
        .args(["inspect", "--schema", &schema_arg(), "--element", "Lake"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    let fields = json["fields"].as_array().unwrap();
    assert_eq!(fields[0]["name"], "depth");
    assert_eq!(fields[1]["binding"], "MultiPolygon");
}

#[test]
fn test_cli_inspect_unknown_element() {
    let output = gmlschema_bin()
        .args(["inspect", "--schema", &schema_arg(), "--element", "Bridge"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Bridge"));
}
