//! Integration tests for the offline `aifunc` commands.

#![cfg(test)]
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn aifunc() -> Command {
    let mut cmd = Command::cargo_bin("aifunc").expect("aifunc bin");
    cmd.env_remove("OPENAI_API_KEY").env_remove("OPENAI_BASE_URL");
    cmd
}

#[test]
fn repair_turns_python_dict_into_json() {
    let output = aifunc()
        .args(["-o", "json", "repair", "--schema"])
        .arg(fixture("person_schema.yaml"))
        .arg("--input")
        .arg(fixture("raw_python.txt"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value["name"], "Ann Lee");
    assert_eq!(value["age"], 30);
}

#[test]
fn repair_reads_stdin_and_reports_trace() {
    let output = aifunc()
        .args(["-o", "json", "repair", "--trace", "--schema"])
        .arg(fixture("person_schema.yaml"))
        .write_stdin("{'name': 'Bo', 'age': 4,}")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(report["value"]["name"], "Bo");
    assert_eq!(report["stage"], "heuristic_repair");
    assert!(report["trace"].as_array().is_some_and(|t| !t.is_empty()));
}

#[test]
fn repair_prints_bare_string_in_text_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = dir.path().join("city.json");
    std::fs::write(&schema, r#"{"type": "string"}"#).expect("write schema");

    aifunc()
        .arg("repair")
        .arg("--schema")
        .arg(&schema)
        .write_stdin("```json\n{\"returnData\": \"Rome\"}\n```")
        .assert()
        .success()
        .stdout("Rome\n");
}

#[test]
fn repair_fails_on_garbage() {
    aifunc()
        .arg("repair")
        .arg("--schema")
        .arg(fixture("person_schema.yaml"))
        .write_stdin("???not json???")
        .assert()
        .failure()
        .stderr(contains("Unrecoverable format"));
}

#[test]
fn schema_prints_signature() {
    aifunc()
        .arg("schema")
        .arg(fixture("person_schema.yaml"))
        .assert()
        .success()
        .stdout(contains(
            r#"{"name": str, "age": float, "nickname": Optional[str]}"#,
        ))
        .stdout(contains("name: Full name"));
}

#[test]
fn schema_json_reports_carrier() {
    let output = aifunc()
        .args(["-o", "json", "schema"])
        .arg(fixture("person_schema.yaml"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(report["carrier"], false);
    assert_eq!(report["example"]["age"], 0);
}

#[test]
fn schema_rejects_unknown_type() {
    aifunc()
        .arg("schema")
        .arg(fixture("bad_schema.yaml"))
        .assert()
        .failure()
        .stderr(contains("unknown type"));
}

#[test]
fn call_without_api_key_is_a_configuration_error() {
    aifunc()
        .arg("call")
        .arg(fixture("capital.yaml"))
        .assert()
        .failure()
        .stderr(contains("API key is required"));
}
