#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn evalkit() -> Command {
    let mut cmd = Command::cargo_bin("evalkit").unwrap();
    cmd.env_remove("EVALKIT_CONFIG").env("RUST_LOG", "warn");
    cmd
}

fn lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line is JSON"))
        .collect()
}

/// Module responses for the full four-round loop, given what `double` returns.
fn scripted_responses(double: impl Fn(f64) -> f64) -> String {
    let mut out = vec![json!({"id": 0}), json!({"id": 1, "success": true})];
    let mut id = 2;
    let mut x = 1.0_f64;
    for _ in 0..4 {
        let y = x * x;
        out.push(json!({"id": id, "success": true, "output": y}));
        out.push(json!({"id": id + 1}));
        x = double(y);
        out.push(json!({"id": id + 2, "success": true, "output": x}));
        out.push(json!({"id": id + 3}));
        id += 4;
    }
    out.iter().map(|v| format!("{}\n", v)).collect()
}

#[test]
fn contract_messages_follow_the_square_double_loop() {
    let assert = evalkit()
        .args(["eval", "hello"])
        .write_stdin(scripted_responses(|y| y * 2.0))
        .assert()
        .success();

    let sent = lines(&assert.get_output().stdout);
    assert_eq!(sent.len(), 18);
    assert_eq!(sent[0]["kind"], "start");
    assert_eq!(sent[0]["eval"], "hello");
    assert_eq!(sent[1], json!({"id": 1, "kind": "define", "module": "hello"}));

    let evaluations: Vec<(&str, f64)> = sent
        .iter()
        .filter(|m| m["kind"] == "evaluate")
        .map(|m| (m["function"].as_str().unwrap(), m["input"].as_f64().unwrap()))
        .collect();
    assert_eq!(
        evaluations,
        vec![
            ("square", 1.0),
            ("double", 1.0),
            ("square", 2.0),
            ("double", 4.0),
            ("square", 8.0),
            ("double", 64.0),
            ("square", 128.0),
            ("double", 16384.0),
        ]
    );

    for analysis in sent.iter().filter(|m| m["kind"] == "analysis") {
        assert_eq!(analysis["valid"], true);
        assert_eq!(analysis["of"].as_u64().unwrap() + 1, analysis["id"].as_u64().unwrap());
    }
}

#[test]
fn contract_early_eof_exits_quietly() {
    let assert = evalkit()
        .args(["eval", "hello"])
        .write_stdin("")
        .assert()
        .success();

    let sent = lines(&assert.get_output().stdout);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["kind"], "start");
}

#[test]
fn contract_undefined_module_skips_the_loop() {
    let responses = "{\"id\":0}\n{\"id\":1,\"success\":false,\"error\":\"missing\"}\n";
    let assert = evalkit()
        .args(["eval", "hello"])
        .write_stdin(responses)
        .assert()
        .success();

    let sent = lines(&assert.get_output().stdout);
    assert_eq!(sent.len(), 2);
}

#[test]
fn contract_strict_fails_on_invalid_output() {
    let wrong = scripted_responses(|y| y * 3.0);

    evalkit()
        .args(["eval", "hello"])
        .write_stdin(wrong.clone())
        .assert()
        .code(0);

    let assert = evalkit()
        .args(["eval", "hello", "--strict"])
        .write_stdin(wrong)
        .assert()
        .code(1);

    let invalid: Vec<Value> = lines(&assert.get_output().stdout)
        .into_iter()
        .filter(|m| m["kind"] == "analysis" && m["valid"] == false)
        .collect();
    assert_eq!(invalid.len(), 4);
    assert!(invalid[0]["error"]
        .as_str()
        .unwrap()
        .contains("expected 2"));
}

#[test]
fn contract_garbage_response_is_internal_error() {
    evalkit()
        .args(["eval", "hello"])
        .write_stdin("this is not json\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fatal"));
}

#[test]
fn contract_mismatched_id_is_internal_error() {
    evalkit()
        .args(["eval", "hello"])
        .write_stdin("{\"id\":4}\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("id mismatch"));
}

#[test]
fn contract_bad_config_is_internal_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("evalkit.yaml");
    fs::write(&config, "version: 3\n").unwrap();

    evalkit()
        .args(["eval", "hello", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported config version 3"));
}

#[test]
fn contract_builtin_reports_and_writes_summary() {
    let dir = tempdir().unwrap();
    let summary = dir.path().join("summary.json");

    evalkit()
        .args(["eval", "hello", "--builtin", "--iterations", "2", "--summary"])
        .arg(&summary)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "hello: 4/4 outputs valid, x = 8 after 2 round(s)",
        ));

    let written: Value = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(written["defined"], true);
    assert_eq!(written["iterations"], 2);
    assert_eq!(written["value"], 8.0);
    assert_eq!(written["outcome"]["valid"], 4);
}

#[test]
fn contract_module_hello_answers_messages() {
    let messages = concat!(
        "{\"id\":0,\"kind\":\"start\",\"eval\":\"hello\"}\n",
        "{\"id\":1,\"kind\":\"define\",\"module\":\"hello\"}\n",
        "{\"id\":2,\"kind\":\"evaluate\",\"module\":\"hello\",\"function\":\"double\",\"input\":21}\n",
        "{\"id\":3,\"kind\":\"evaluate\",\"module\":\"hello\",\"function\":\"cube\",\"input\":2}\n",
    );
    let assert = evalkit()
        .args(["module", "hello"])
        .write_stdin(messages)
        .assert()
        .success();

    let responses = lines(&assert.get_output().stdout);
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[1], json!({"id": 1, "success": true}));
    assert_eq!(responses[2]["output"], json!(42.0));
    assert_eq!(responses[3]["success"], false);
}

#[test]
fn contract_eval_spawns_module_command() {
    let bin = assert_cmd::cargo::cargo_bin("evalkit");

    evalkit()
        .args(["eval", "hello", "--strict", "--"])
        .arg(&bin)
        .args(["module", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "hello: 8/8 outputs valid, x = 32768 after 4 round(s)",
        ));
}

#[cfg(unix)]
#[test]
fn contract_spawned_module_exiting_early_is_internal_error() {
    evalkit()
        .args(["eval", "hello", "--strict", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("module exited unexpectedly (exit status: 3)"));
}

#[cfg(unix)]
#[test]
fn contract_spawned_module_failing_exit_after_full_loop_is_internal_error() {
    let bin = assert_cmd::cargo::cargo_bin("evalkit");

    evalkit()
        .args(["eval", "hello", "--", "sh", "-c", "\"$0\" module hello; exit 5"])
        .arg(&bin)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("exit status: 5"));
}
