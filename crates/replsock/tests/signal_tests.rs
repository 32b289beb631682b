#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use replsock_ipc::EndpointClient;

const WAIT: Duration = Duration::from_secs(10);

fn spawn_demo(root: &Path) -> Child {
    Command::new(assert_cmd::cargo::cargo_bin!("replsock"))
        .env_remove("REPL_ROOT")
        .env_remove("REPL_SOCKET_PREFIX")
        .env_remove("REPL_SOCKET_MODE")
        .env_remove("REPLSOCK_LOG")
        .arg("--root")
        .arg(root)
        .args(["demo", "app"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

fn connect_when_ready(path: &Path, child: &mut Child) -> EndpointClient {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Ok(mut client) = EndpointClient::connect(path) {
            client.read_prompt().unwrap();
            return client;
        }
        if Instant::now() > deadline || child.try_wait().unwrap().is_some() {
            let _ = child.kill();
            panic!("demo endpoint never came up at {}", path.display());
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn wait_for_exit(child: &mut Child) -> ExitStatus {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("demo did not exit after signal");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn assert_signal_drains_and_exits_cleanly(signal: libc::c_int) {
    let root = tempfile::tempdir().unwrap();
    let path: PathBuf = root.path().join("logs/repl/app");
    let mut child = spawn_demo(root.path());

    let mut client = connect_when_ready(&path, &mut child);
    assert_eq!(client.eval("2+2").unwrap(), "4");

    let rc = unsafe { libc::kill(child.id() as libc::pid_t, signal) };
    assert_eq!(rc, 0);

    let status = wait_for_exit(&mut child);
    assert_eq!(status.code(), Some(0));
    assert!(!path.exists());
    client.read_to_close().unwrap();
}

#[test]
fn test_sigint_drains_and_exits_zero() {
    assert_signal_drains_and_exits_cleanly(libc::SIGINT);
}

#[test]
fn test_sighup_drains_and_exits_zero() {
    assert_signal_drains_and_exits_cleanly(libc::SIGHUP);
}
