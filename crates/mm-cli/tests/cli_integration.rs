//! CLI surface tests
//!
//! Exercises the mm binary with assert_cmd; nothing here touches a live
//! mesh except the failure paths, which must exit 1 with a stderr line.

use assert_cmd::Command;
use predicates::prelude::*;

fn mm() -> Command {
    Command::cargo_bin("mm").expect("mm binary should be built")
}

#[test]
fn test_cli_help() {
    mm().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Peer-to-peer mesh"))
        .stdout(predicate::str::contains("join"))
        .stdout(predicate::str::contains("tell"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("kill"));
}

#[test]
fn test_cli_version() {
    mm().arg("--version").assert().success();
}

#[test]
fn test_cli_join_help() {
    mm().args(["join", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--peer"))
        .stdout(predicate::str::contains("--no-discovery"));
}

#[test]
fn test_cli_tell_requires_name_and_message() {
    mm().arg("tell").assert().failure();
    mm().args(["tell", "alice"]).assert().failure();
}

#[test]
fn test_cli_list_unreachable_server_exits_one() {
    mm().args(["list", "--host", "127.0.0.1", "--port", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("127.0.0.1:1"));
}

#[test]
fn test_cli_tell_unreachable_server_exits_one() {
    mm().args(["tell", "alice", "hi", "--host", "127.0.0.1", "--port", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::is_empty().not());
}

#[test]
fn test_cli_kill_without_targets_exits_one() {
    mm().arg("kill")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--all"));
}

#[test]
fn test_cli_kill_bad_peer_id_exits_one() {
    mm().args(["kill", "not-a-peer-id"])
        .assert()
        .code(1)
        .stderr(predicate::str::is_empty().not());
}
