//! Binary tests for the `ms` command

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `ms` with config and log locations redirected into `home`
fn ms(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ms").expect("ms binary should build");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"));
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    ms(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("coordinator"))
        .stdout(predicate::str::contains("notify"));
}

#[test]
fn test_endpoint_prints_fixed_name() {
    let home = TempDir::new().unwrap();
    ms(&home)
        .arg("endpoint")
        .assert()
        .success()
        .stdout("internal:cluster/node/mapping/refresh\n");
}

#[test]
fn test_notify_without_coordinator_succeeds() {
    let home = TempDir::new().unwrap();
    ms(&home)
        .args(["notify", "logs-2024", "--instance", "inst-42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No coordinator known"));
}

#[test]
fn test_notify_unreachable_coordinator_succeeds() {
    let home = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    ms(&home)
        .args(["notify", "logs-2024", "--coordinator", &addr])
        .assert()
        .success()
        .stdout(predicate::str::contains("not delivered"));
}

#[test]
fn test_notify_rejects_empty_resource() {
    let home = TempDir::new().unwrap();
    ms(&home)
        .args(["notify", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("resource name must not be empty"));
}

#[test]
fn test_notify_unknown_resource_is_reported_as_rejected() {
    let home = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    // coordinator with an empty catalog refuses every resource
    let mut coordinator = std::process::Command::new(assert_cmd::cargo::cargo_bin("ms"))
        .args(["coordinator", "--listen", &addr])
        .current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let mut ready = false;
    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            ready = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    let assert = ready.then(|| {
        ms(&home)
            .args(["notify", "logs-2024", "--coordinator", &addr])
            .assert()
    });
    coordinator.kill().unwrap();
    let _ = coordinator.wait();

    assert
        .expect("coordinator should start listening")
        .success()
        .stdout(predicate::str::contains("rejected by the coordinator"));
}
