//! Exit status of the `catalog-api` binary.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Lines, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

fn binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_catalog-api"));
    cmd.env_remove("RUST_LOG").args(["--log-format", "json"]);
    cmd
}

/// Start the binary on an ephemeral port and wait for it to serve.
fn start(extra: &[&str]) -> (Child, Lines<BufReader<ChildStdout>>, SocketAddr) {
    let mut child = binary()
        .args(["--port", "0"])
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let addr = lines
        .by_ref()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(&line).ok())
        .find(|event| event["message"] == "starting server")
        .and_then(|event| event["address"].as_str()?.parse::<SocketAddr>().ok())
        .expect("server announced its address");

    let addr = SocketAddr::from(([127, 0, 0, 1], addr.port()));
    (child, lines, addr)
}

fn terminate(mut child: Child, lines: Lines<BufReader<ChildStdout>>) -> ExitStatus {
    let sent = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    // Keep reading so the child never blocks on a full pipe.
    lines.map_while(Result::ok).for_each(drop);
    child.wait().unwrap()
}

#[test]
fn sigterm_with_nothing_in_flight_exits_zero() {
    let (child, lines, _) = start(&[]);
    let status = terminate(child, lines);
    assert!(status.success(), "{:?}", status);
}

#[test]
fn drain_timeout_exits_non_zero() {
    let (child, lines, addr) = start(&["--shutdown-timeout", "1"]);

    // Headers promise a body that never finishes arriving, so the request
    // stays in flight past the deadline.
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .write_all(
            b"POST /v1/movies HTTP/1.1\r\n\
              host: localhost\r\n\
              content-type: application/json\r\n\
              content-length: 100\r\n\r\n{\"title\":",
        )
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(300));

    let status = terminate(child, lines);
    assert_eq!(status.code(), Some(1));
    drop(stream);
}

#[test]
fn bind_failure_exits_non_zero() {
    let taken = TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    let status = binary()
        .args(["--port", &port])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}
