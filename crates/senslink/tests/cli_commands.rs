#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use senslink::frame::{Frame, FrameType, Reassembler};

fn senslink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_senslink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

/// Accept one connection and read until a complete frame arrives.
fn recv_frame(stream: &mut std::net::TcpStream) -> Frame {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout should be settable");
    let mut reassembler = Reassembler::new();
    let mut buf = [0u8; 64];
    loop {
        let n = stream.read(&mut buf).expect("device read should succeed");
        assert!(n > 0, "host hung up before sending a frame");
        reassembler.feed(&buf[..n]);
        if let Some(frame) = reassembler.drain().next() {
            return frame;
        }
    }
}

fn wire(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    Frame::new(frame_type, payload.to_vec())
        .expect("payload should fit")
        .to_wire()
        .to_vec()
}

#[test]
fn version_prints_name_and_version() {
    let output = senslink().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("senslink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_reports_protocol() {
    let output = senslink()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: senslink"));
    assert!(stdout.contains("protocol_version: 1"));
    assert!(stdout.contains("max_payload: 65535"));
}

#[test]
fn send_to_missing_port_is_transport_error() {
    let output = senslink()
        .args(["send", "/dev/senslink-no-such-port", "get-status"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("open failed"));
}

#[test]
fn send_waits_for_ack_over_tcp_bridge() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("addr").to_string();

    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        let command = recv_frame(&mut stream);
        assert_eq!(command.frame_type(), FrameType::Command);
        let payload = command.payload().to_vec();
        stream
            .write_all(&wire(FrameType::Ack, &[payload[0], payload[1], 0]))
            .expect("ack write should succeed");
        payload
    });

    let output = senslink()
        .args(["--format", "json", "send", &addr, "--tcp", "stop", "--wait"])
        .output()
        .expect("send should run");

    let payload = device.join().expect("device thread should finish");
    assert_eq!(payload, vec![0x03, 0x01]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"type\":\"ack\""));
    assert!(stdout.contains("\"cmd_id\":3"));
}

#[test]
fn send_wait_timeout_returns_124() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("addr").to_string();
    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        recv_frame(&mut stream);
        // Hold the connection open without answering.
        thread::sleep(Duration::from_millis(600));
    });

    let output = senslink()
        .args([
            "send",
            &addr,
            "--tcp",
            "get-status",
            "--wait",
            "--wait-timeout",
            "200ms",
        ])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(124));
    let _ = device.join();
}

#[test]
fn monitor_prints_status_and_quits_on_q() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("addr").to_string();
    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        let command = recv_frame(&mut stream);
        assert_eq!(command.payload()[0], 0x01);
        stream
            .write_all(&wire(FrameType::Status, &[0x01, 0x02]))
            .expect("status write should succeed");
        // Stay connected until the host hangs up.
        let mut buf = [0u8; 64];
        while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
    });

    let mut child = senslink()
        .args(["--format", "json", "monitor", &addr, "--tcp"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("monitor should start");

    let mut stdout = BufReader::new(child.stdout.take().expect("stdout is piped"));
    let mut status = String::new();
    stdout
        .read_line(&mut status)
        .expect("monitor should print an event");
    assert!(status.contains("\"type\":\"status\""), "got {status}");
    assert!(status.contains("\"state\":\"measuring\""));
    assert!(status.contains("\"active_sensors\":2"));

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(b"q\n")
        .expect("quit should be written");

    let mut rest = String::new();
    stdout
        .read_to_string(&mut rest)
        .expect("monitor output should be readable");
    let status_code = child.wait().expect("monitor should exit");
    let _ = device.join();

    assert!(status_code.success());
    assert!(rest.contains("\"frames_received\":1"));
    assert!(rest.contains("\"frames_sent\":1"));
}
