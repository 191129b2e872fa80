// Drives the built binary in a scratch directory: init, run, status.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: [&str; 8] = [
    "OPERATOR_ID",
    "OPERATOR_PVKEY",
    "TREASURY_ID",
    "TREASURY_PVKEY",
    "ALICE_ID",
    "ALICE_PVKEY",
    "HEDERA_NETWORK",
    "RUST_LOG",
];

fn provisioner(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("token-provisioner").unwrap();
    cmd.current_dir(dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    provisioner(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_init_dry_run_creates_nothing() {
    let dir = TempDir::new().unwrap();
    provisioner(&dir)
        .args(["init", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would create configuration file: provisioner.toml"));

    assert!(!dir.path().join("provisioner.toml").exists());
    assert!(!dir.path().join(".env").exists());
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    provisioner(&dir).arg("init").assert().success();

    provisioner(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Use --force to overwrite"));

    provisioner(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn test_run_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    provisioner(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing operator"));
}

#[test]
fn test_run_without_bytecode_reports_step_one() {
    let dir = TempDir::new().unwrap();
    provisioner(&dir).arg("init").assert().success();

    provisioner(&dir)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("STEP 1 failed"));
}

#[test]
fn test_init_run_status_round_trip() {
    let dir = TempDir::new().unwrap();
    provisioner(&dir).arg("init").assert().success();
    std::fs::write(
        dir.path().join("MintAssociateTransferHTS_sol_MintAssoTransHTS.bin"),
        vec![0x60u8; 3_000],
    )
    .unwrap();

    provisioner(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("STEP 1 ===="))
        .stdout(predicate::str::contains("STEP 9 ===="))
        .stdout(predicate::str::contains("PROVISIONING COMPLETE"))
        .stdout(predicate::str::contains("Supply:    250"));

    provisioner(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("All steps completed"));

    provisioner(&dir)
        .arg("resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("already covers every step"));
}
