#![allow(unused_crate_dependencies)]
#![cfg(unix)]

mod common;

use cli::install::{ActiveState, Systemd, UnitSpec};
use cli::CliError;
use common::FakeSystemctl;
use std::fs;
use std::path::PathBuf;

struct Fixture {
    _tmp: tempfile::TempDir,
    units: PathBuf,
    fake: FakeSystemctl,
    systemd: Systemd,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let units = tmp.path().join("units");
    let bin = tmp.path().join("bin");
    fs::create_dir_all(&units).unwrap();
    fs::create_dir_all(&bin).unwrap();

    let fake = FakeSystemctl::new(&bin);
    let systemd = Systemd::with_paths(&units, &fake.binary);
    Fixture {
        _tmp: tmp,
        units,
        fake,
        systemd,
    }
}

fn unit(app: &str) -> UnitSpec {
    UnitSpec {
        app_name: app.to_string(),
        launcher: PathBuf::from("/usr/local/bin/launch"),
        executable: PathBuf::from("/opt/app/app"),
        working_dir: PathBuf::from("/opt/app"),
        enable_log_file: false,
        exit_with_child: false,
        args: Vec::new(),
    }
}

#[test]
fn test_install_writes_and_enables_unit() {
    let f = fixture();
    f.systemd.install(&unit("app")).unwrap();

    let text = fs::read_to_string(f.units.join("app.service")).unwrap();
    assert!(text.contains("ExecStart=/usr/local/bin/launch -appname=app"));
    assert_eq!(f.fake.calls(), vec!["daemon-reload", "enable app.service"]);
}

#[test]
fn test_install_refuses_existing_unit() {
    let f = fixture();
    fs::write(f.units.join("app.service"), "[Unit]\n").unwrap();

    match f.systemd.install(&unit("app")) {
        Err(CliError::ServiceCommand(msg)) => assert!(msg.contains("already exist"), "{}", msg),
        other => panic!("expected ServiceCommand error, got {:?}", other),
    }
    assert!(f.fake.calls().is_empty());
}

#[test]
fn test_install_rolls_back_when_enable_fails() {
    let f = fixture();
    f.fake.fail_on("enable");

    assert!(f.systemd.install(&unit("app")).is_err());
    assert!(!f.units.join("app.service").exists());
}

#[test]
fn test_start_is_noop_when_active() {
    let f = fixture();
    f.systemd.install(&unit("app")).unwrap();
    f.fake.set_state("active");

    f.systemd.start("app").unwrap();
    assert!(!f.fake.calls().iter().any(|c| c.starts_with("start")));
}

#[test]
fn test_start_inactive_service() {
    let f = fixture();
    f.systemd.install(&unit("app")).unwrap();
    f.fake.set_state("inactive");

    f.systemd.start("app").unwrap();
    assert_eq!(f.fake.calls().last().unwrap(), "start app.service");
}

#[test]
fn test_pending_state_is_an_error() {
    let f = fixture();
    f.systemd.install(&unit("app")).unwrap();
    f.fake.set_state("deactivating");

    assert_eq!(
        f.systemd.active_state("app").unwrap(),
        ActiveState::Deactivating
    );
    match f.systemd.start("app") {
        Err(CliError::ServiceCommand(msg)) => assert!(msg.contains("pending"), "{}", msg),
        other => panic!("expected pending error, got {:?}", other),
    }
    assert!(f.systemd.stop("app").is_err());
}

#[test]
fn test_stop_skips_stopped_service() {
    let f = fixture();
    f.systemd.install(&unit("app")).unwrap();

    f.fake.set_state("failed");
    f.systemd.stop("app").unwrap();
    assert!(!f.fake.calls().iter().any(|c| c.starts_with("stop")));

    f.fake.set_state("active");
    f.systemd.stop("app").unwrap();
    assert_eq!(f.fake.calls().last().unwrap(), "stop app.service");
}

#[test]
fn test_uninstall_stops_disables_and_removes() {
    let f = fixture();
    f.systemd.install(&unit("app")).unwrap();
    f.fake.set_state("active");

    f.systemd.uninstall("app").unwrap();

    assert!(!f.units.join("app.service").exists());
    let calls = f.fake.calls();
    let tail: Vec<&str> = calls[2..].iter().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "show -p ActiveState --value app.service",
            "stop app.service",
            "disable app.service",
            "daemon-reload",
        ]
    );
}

#[test]
fn test_unknown_service() {
    let f = fixture();
    match f.systemd.uninstall("nope") {
        Err(CliError::ServiceCommand(msg)) => assert!(msg.contains("not found"), "{}", msg),
        other => panic!("expected not found, got {:?}", other),
    }
    assert!(f.systemd.start("nope").is_err());
    assert!(f.systemd.stop("nope").is_err());
}
