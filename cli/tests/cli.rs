use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn kv_set_then_get_round_trips_in_one_invocation() {
    let mut cmd = Command::cargo_bin("workspace-cli").unwrap();
    cmd.args(["--non-interactive", "--query=kv set theme dark"]);
    cmd.assert().success();
}

#[test]
fn unrecognized_command_reports_an_error_but_does_not_panic() {
    let mut cmd = Command::cargo_bin("workspace-cli").unwrap();
    cmd.args(["--non-interactive", "--query=bogus command"]);
    cmd.assert().success().stderr(predicate::str::contains("unrecognized command"));
}
