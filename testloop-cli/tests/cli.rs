use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

fn testloop() -> Command {
  let mut cmd = Command::cargo_bin("testloop-cli").expect("binary");
  cmd.env("RUST_LOG", "info");
  cmd
}

#[test]
fn smoke_namespace_passes() {
  testloop()
    .args(["run", "testloop_cli::demo::smoke"])
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "PASS = #1 testloop_cli::demo::smoke::session_is_open",
    ))
    .stdout(predicate::str::contains("KTF  = #1 testloop_cli::demo::smoke::known_issue (DEMO-7)"))
    .stdout(predicate::str::contains("slow_soak").not());
}

#[test]
fn failing_test_sets_exit_code_but_run_continues() {
  testloop()
    .args(["run", "--loop", "2"])
    .assert()
    .failure()
    .stdout(predicate::str::contains(
      "FAIL = #1 testloop_cli::demo::failing::rejects_empty_command",
    ))
    .stdout(predicate::str::contains(
      "PASS = #2 testloop_cli::demo::smoke::store_roundtrip",
    ))
    .stderr(predicate::str::contains("closed loopback session"));
}

#[test]
fn include_skipped_runs_the_soak_test() {
  testloop()
    .args([
      "run",
      "testloop_cli::demo::smoke",
      "--include-skipped",
      "--label",
      "slow",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "PASS = #1 testloop_cli::demo::smoke::slow_soak",
    ));
}

#[test]
fn zero_loops_is_rejected() {
  testloop()
    .args(["run", "--loop", "0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("loop count must be a positive integer"));
}

#[test]
fn malformed_namespace_is_rejected() {
  testloop()
    .args(["run", "demo::::smoke"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("demo::::smoke"));
}

#[test]
fn report_dir_is_scoped_by_run_id() {
  let temp = tempdir().unwrap();
  testloop()
    .args(["run", "testloop_cli::demo::smoke", "--run-id", "nightly"])
    .arg("--report-dir")
    .arg(temp.path())
    .assert()
    .success();

  let run_dir = temp.path().join("nightly");
  let summary = fs::read_to_string(run_dir.join("summary.txt")).unwrap();
  assert!(summary.contains("session_is_open"));

  let report: Value =
    serde_json::from_str(&fs::read_to_string(run_dir.join("report.json")).unwrap()).unwrap();
  assert_eq!(report["schema_version"], 1);
  assert_eq!(report["summary"]["run_id"], "nightly");
  assert_eq!(report["summary"]["counters"]["fail"], 0);
  assert_eq!(report["summary"]["counters"]["ktf"], 1);
  assert_eq!(report["results"].as_array().unwrap().len(), 3);
}

#[test]
fn known_to_fail_manifest_marks_failures() {
  let temp = tempdir().unwrap();
  let manifest = temp.path().join("ktf.toml");
  fs::write(
    &manifest,
    "[[known_to_fail]]\nglob = \"testloop_cli::demo::failing::*\"\nbug = \"DEMO-9\"\n",
  )
  .unwrap();

  // The manifest only records a bug reference; a failing body still fails.
  testloop()
    .args(["run", "testloop_cli::demo::failing"])
    .arg("--known-to-fail")
    .arg(&manifest)
    .assert()
    .failure()
    .stdout(predicate::str::contains("rejects_empty_command (DEMO-9)"));
}

#[test]
fn plan_lists_skipped_tests_as_json() {
  let output = testloop()
    .args(["plan", "testloop_cli::demo::smoke", "--json"])
    .output()
    .unwrap();
  assert!(output.status.success());
  let plan: Value = serde_json::from_slice(&output.stdout).unwrap();
  let entries = plan.as_array().unwrap();
  let names: Vec<_> = entries
    .iter()
    .map(|e| e["name"].as_str().unwrap())
    .collect();
  assert_eq!(
    names,
    vec![
      "testloop_cli::demo::smoke::session_is_open",
      "testloop_cli::demo::smoke::store_roundtrip",
      "testloop_cli::demo::smoke::known_issue",
      "testloop_cli::demo::smoke::slow_soak",
    ]
  );
  assert_eq!(entries[3]["skip"], true);
  assert_eq!(entries[0]["prepared_by"], "testloop");
  assert_eq!(entries[0]["reviewed_by"], "???");
}

#[test]
fn labels_are_listed_once() {
  testloop()
    .arg("labels")
    .assert()
    .success()
    .stdout("negative\nsmoke\nslow\nsoak\nstore\n");
}

#[test]
fn run_prints_json_report_on_request() {
  let output = testloop()
    .args(["run", "testloop_cli::demo::smoke", "--json", "--loop", "2"])
    .output()
    .unwrap();
  assert!(output.status.success());
  let report: Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["summary"]["loop_count"], 2);
  assert_eq!(report["summary"]["counters"]["total"], 6);
  assert_eq!(report["results"][5]["cycle"], 1);
}
